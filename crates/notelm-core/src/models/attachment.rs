//! Attachment model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of file attached to a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// PDF document whose text was extracted into the note
    Pdf,
    /// Image file
    Image,
    /// Any other file
    File,
}

impl AttachmentKind {
    /// Guess the kind from a file name extension
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Self::Pdf,
            "png" | "jpg" | "jpeg" | "gif" | "webp" => Self::Image,
            _ => Self::File,
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::File => "file",
        };
        f.write_str(label)
    }
}

impl FromStr for AttachmentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            other => Err(Error::InvalidInput(format!(
                "Unknown attachment kind: {other}"
            ))),
        }
    }
}

/// Attachment metadata carried inside a note document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Original file name.
    pub name: String,
    /// File kind.
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Upload timestamp (Unix ms).
    pub uploaded_at: i64,
}

impl Attachment {
    /// Create a new attachment metadata record.
    pub fn new(name: impl Into<String>, kind: AttachmentKind, uploaded_at: i64) -> Result<Self> {
        let name = name.into().trim().to_string();

        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment name cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            name,
            kind,
            uploaded_at,
        })
    }

    /// File name without its extension, used to title untitled notes.
    #[must_use]
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map_or(self.name.as_str(), |(stem, _)| stem)
    }
}
