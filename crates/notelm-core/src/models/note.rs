//! Note model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::attachment::Attachment;

/// Title given to freshly created notes.
pub const DEFAULT_NOTE_TITLE: &str = "Untitled Note";

/// A unique identifier for a note, using UUID v7 (time-sortable)
///
/// Ids are generated locally and must not collide across devices, so a
/// random-suffixed v7 id is used instead of a clock-only value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A note in the system
///
/// Field names are camelCase on the wire so remote documents mirror the
/// entity verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// Note title
    #[serde(default)]
    pub title: String,
    /// Markdown content
    #[serde(default)]
    pub content: String,
    /// Deduplicated tag set
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Deduplicated source URLs
    #[serde(default)]
    pub sources: BTreeSet<String>,
    /// Attached files in upload order
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Note {
    /// Create an empty note stamped with `updated_at`
    #[must_use]
    pub fn new(updated_at: i64) -> Self {
        Self {
            id: NoteId::new(),
            title: DEFAULT_NOTE_TITLE.to_string(),
            content: String::new(),
            tags: BTreeSet::new(),
            sources: BTreeSet::new(),
            attachments: Vec::new(),
            updated_at,
        }
    }

    /// Merge the fields present in `patch` into this note.
    ///
    /// Does not touch `updated_at`; the store owns timestamp advancement.
    pub(crate) fn merge(&mut self, patch: NotePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(sources) = patch.sources {
            self.sources = sources;
        }
        if let Some(attachments) = patch.attachments {
            self.attachments = attachments;
        }
    }

    /// Whether the note still carries the default (or an empty) title
    #[must_use]
    pub fn is_untitled(&self) -> bool {
        let title = self.title.trim();
        title.is_empty() || title == DEFAULT_NOTE_TITLE
    }

    /// Title for display, falling back to the first content line
    #[must_use]
    pub fn display_title(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            self.content.lines().next().unwrap_or("")
        } else {
            self.title.as_str()
        };
        source.trim().chars().take(max_len).collect()
    }

    /// Case-insensitive match against title and content
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle) || self.content.to_lowercase().contains(&needle)
    }

    /// Check if note content is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Partial update for a note. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub sources: Option<BTreeSet<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl NotePatch {
    /// Set the title
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the content
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Replace the tag set; blank entries are dropped
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(normalize_set(tags));
        self
    }

    /// Replace the source set; blank entries are dropped
    #[must_use]
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(normalize_set(sources));
        self
    }

    /// Replace the attachment list
    #[must_use]
    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    /// True when the patch carries no fields
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.sources.is_none()
            && self.attachments.is_none()
    }
}

fn normalize_set<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(|value| value.into().trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}
