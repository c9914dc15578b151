use std::path::Path;

use crate::commands::common::{
    format_note_lines, list_notes, note_to_list_item, open_notes, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    tag: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let notes = list_notes(limit, tag, db_path).await?;
    let current = open_notes(db_path)?.current_note().await.map(|note| note.id);

    if as_json {
        let json_items = notes
            .iter()
            .map(|note| note_to_list_item(note, current))
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes, current) {
            println!("{line}");
        }
    }

    Ok(())
}
