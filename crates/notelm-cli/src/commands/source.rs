use std::path::Path;

use crate::cli::SourceCommands;
use crate::commands::common::{normalize_note_identifier, open_notes, resolve_note};
use crate::error::CliError;

pub async fn run_source(command: SourceCommands, db_path: &Path) -> Result<(), CliError> {
    let notes = open_notes(db_path)?;

    let updated = match command {
        SourceCommands::Add { id, url } => {
            let note = resolve_note(&normalize_note_identifier(&id)?, &notes).await?;
            notes.add_source(&note.id, &url).await?
        }
        SourceCommands::Remove { id, url } => {
            let note = resolve_note(&normalize_note_identifier(&id)?, &notes).await?;
            notes.remove_source(&note.id, &url).await?
        }
    };

    println!("{}", updated.id);
    for source in &updated.sources {
        println!("  {source}");
    }
    Ok(())
}
