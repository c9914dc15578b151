use std::path::Path;

use notelm_core::NotePatch;

use crate::commands::common::{open_notes, resolve_note_content};
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

pub async fn run_add(
    content_parts: &[String],
    title: Option<String>,
    tags: &[String],
    db_path: &Path,
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;

    let mut patch = NotePatch::default().content(content);
    if let Some(title) = normalize_text_option(title) {
        patch = patch.title(title);
    }
    if !tags.is_empty() {
        patch = patch.tags(tags.iter().map(String::as_str));
    }

    let notes = open_notes(db_path)?;
    let note = notes.create_note_with(patch).await?;

    println!("{}", note.id);
    Ok(())
}
