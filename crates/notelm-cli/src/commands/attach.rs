use std::path::Path;

use notelm_core::models::AttachmentKind;

use crate::cli::AttachmentKindArg;
use crate::commands::common::{normalize_note_identifier, open_notes, resolve_note};
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

impl From<AttachmentKindArg> for AttachmentKind {
    fn from(value: AttachmentKindArg) -> Self {
        match value {
            AttachmentKindArg::Pdf => Self::Pdf,
            AttachmentKindArg::Image => Self::Image,
            AttachmentKindArg::File => Self::File,
        }
    }
}

pub async fn run_attach(
    id: &str,
    file: &Path,
    name: Option<String>,
    kind: Option<AttachmentKindArg>,
    db_path: &Path,
) -> Result<(), CliError> {
    let extracted_text = std::fs::read_to_string(file)?;
    let name = normalize_text_option(name)
        .or_else(|| {
            file.file_name()
                .map(|file_name| file_name.to_string_lossy().into_owned())
        })
        .ok_or_else(|| CliError::Config(format!("Cannot name attachment {}", file.display())))?;
    let kind = kind.map_or_else(|| AttachmentKind::from_file_name(&name), AttachmentKind::from);

    let notes = open_notes(db_path)?;
    let note = resolve_note(&normalize_note_identifier(id)?, &notes).await?;
    let updated = notes
        .attach(&note.id, &name, kind, &extracted_text)
        .await?;

    println!("{}", updated.id);
    Ok(())
}
