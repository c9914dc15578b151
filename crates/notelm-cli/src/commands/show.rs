use std::fmt::Write as _;
use std::path::Path;

use notelm_core::export::note_to_export_item;
use notelm_core::Note;

use crate::commands::common::{
    format_timestamp, normalize_note_identifier, open_notes, resolve_note,
};
use crate::error::CliError;

pub async fn run_show(id: Option<&str>, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let notes = open_notes(db_path)?;
    let note = match id {
        Some(id) => resolve_note(&normalize_note_identifier(id)?, &notes).await?,
        None => notes.current_note().await.ok_or(CliError::NoSelection)?,
    };

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&note_to_export_item(&note))?
        );
    } else {
        print!("{}", render_note_details(&note));
    }
    Ok(())
}

pub fn render_note_details(note: &Note) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", note.title);
    let _ = writeln!(output, "id:      {}", note.id);
    let _ = writeln!(output, "updated: {}", format_timestamp(note.updated_at));
    if !note.tags.is_empty() {
        let tags = note.tags.iter().cloned().collect::<Vec<_>>().join(", ");
        let _ = writeln!(output, "tags:    {tags}");
    }
    for source in &note.sources {
        let _ = writeln!(output, "source:  {source}");
    }
    for attachment in &note.attachments {
        let _ = writeln!(output, "attach:  {} ({})", attachment.name, attachment.kind);
    }
    if !note.content.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", note.content);
    }
    output
}
