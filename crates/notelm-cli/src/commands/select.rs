use std::path::Path;

use crate::commands::common::{normalize_note_identifier, open_notes, resolve_note};
use crate::error::CliError;

pub async fn run_select(id: Option<&str>, clear: bool, db_path: &Path) -> Result<(), CliError> {
    let notes = open_notes(db_path)?;

    if clear {
        notes.clear_selection().await?;
        return Ok(());
    }

    match id {
        Some(id) => {
            let note = resolve_note(&normalize_note_identifier(id)?, &notes).await?;
            notes.select_note(&note.id).await?;
            println!("{}", note.id);
        }
        None => {
            let current = notes.current_note().await.ok_or(CliError::NoSelection)?;
            println!("{}", current.id);
        }
    }
    Ok(())
}
