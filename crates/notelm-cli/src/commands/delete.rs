use std::path::Path;

use notelm_core::remote::RemoteChannel;

use crate::commands::common::{
    normalize_note_identifier, open_notes, resolve_note, resolve_sync_target,
};
use crate::error::CliError;

pub async fn run_delete(id: &str, profile: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let notes = open_notes(db_path)?;
    let note = resolve_note(&normalized_id, &notes).await?;

    notes.delete_note(&note.id).await?;

    // Without an engine running, the remote copy must be removed here or the
    // next sync would bring the note back.
    match resolve_sync_target(profile) {
        Ok(Some(target)) => {
            if let Err(error) = target.remote().delete(&target.user_id, &note.id).await {
                tracing::warn!("Failed to delete note {} remotely: {}", note.id, error);
            }
        }
        Ok(None) => {}
        Err(error) => tracing::warn!("Skipping remote delete: {}", error),
    }

    println!("{}", note.id);
    Ok(())
}
