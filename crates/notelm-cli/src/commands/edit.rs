use std::path::Path;

use notelm_core::NotePatch;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_note_identifier, open_notes, resolve_note,
};
use crate::config_profiles::normalize_text_option;
use crate::error::CliError;

pub async fn run_edit(id: &str, title: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let notes = open_notes(db_path)?;
    let note = resolve_note(&normalized_id, &notes).await?;

    if let Some(title) = normalize_text_option(title) {
        let updated = notes
            .update_note(&note.id, NotePatch::default().title(title))
            .await?;
        println!("{}", updated.id);
        return Ok(());
    }

    let Some(edited_content) = capture_editor_input_with_initial(&note.content)? else {
        return Err(CliError::EmptyEditedContent);
    };

    if edited_content == note.content {
        println!("{}", note.id);
        return Ok(());
    }

    let updated = notes
        .update_note(&note.id, NotePatch::default().content(edited_content))
        .await?;
    println!("{}", updated.id);
    Ok(())
}
