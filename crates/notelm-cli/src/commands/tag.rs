use std::path::Path;

use crate::cli::TagCommands;
use crate::commands::common::{normalize_note_identifier, open_notes, render_tags, resolve_note};
use crate::error::CliError;

pub async fn run_tag(command: TagCommands, db_path: &Path) -> Result<(), CliError> {
    let notes = open_notes(db_path)?;

    match command {
        TagCommands::Add { id, tag } => {
            let note = resolve_note(&normalize_note_identifier(&id)?, &notes).await?;
            let updated = notes.add_tag(&note.id, &tag).await?;
            println!("{}  {}", updated.id, render_tags(&updated));
        }
        TagCommands::Remove { id, tag } => {
            let note = resolve_note(&normalize_note_identifier(&id)?, &notes).await?;
            let updated = notes.remove_tag(&note.id, &tag).await?;
            println!("{}  {}", updated.id, render_tags(&updated));
        }
        TagCommands::List { json } => {
            let tags = notes.list_tags().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&tags)?);
            } else {
                for tag in tags {
                    println!("#{tag}");
                }
            }
        }
    }
    Ok(())
}
