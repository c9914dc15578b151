use std::path::Path;
use std::sync::Arc;

use notelm_core::models::SyncConflict;
use notelm_core::sync::{SyncConfig, SyncEngine, SyncHandle, SyncSession};

use crate::commands::common::{
    format_sync_conflict_lines, open_notes, resolve_sync_target, SyncTarget,
};
use crate::error::CliError;

/// Outcome of a sync run.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub notes: usize,
    pub writes: u64,
    pub deletes: u64,
    pub snapshots: u64,
    pub conflicts: Vec<SyncConflict>,
}

pub async fn run_sync(watch: bool, profile: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let target = resolve_sync_target(profile)?.ok_or(CliError::SyncNotConfigured)?;

    let summary = if watch {
        watch_sync(&target, db_path).await?
    } else {
        sync_once(&target, db_path).await?
    };

    println!(
        "Sync completed: {} notes, {} written, {} deleted, {} snapshots applied",
        summary.notes, summary.writes, summary.deletes, summary.snapshots
    );
    for line in format_sync_conflict_lines(&summary.conflicts) {
        println!("{line}");
    }
    Ok(())
}

/// Merge the remote collection into the local store and upload local changes.
pub async fn sync_once(target: &SyncTarget, db_path: &Path) -> Result<SyncSummary, CliError> {
    let (notes, handle) = start_engine(target, db_path).await?;
    let flushed = handle.flush().await;
    let summary = finish(&notes, handle).await?;
    flushed?;
    Ok(summary)
}

async fn watch_sync(target: &SyncTarget, db_path: &Path) -> Result<SyncSummary, CliError> {
    let (notes, handle) = start_engine(target, db_path).await?;
    if let Err(error) = handle.flush().await {
        tracing::warn!("Initial upload incomplete: {}", error);
    }

    println!(
        "Watching {} as '{}' (Ctrl-C to stop)",
        target.remote_dir.display(),
        target.user_id
    );
    tokio::signal::ctrl_c().await?;

    if let Err(error) = handle.flush().await {
        tracing::warn!("Final upload incomplete: {}", error);
    }
    finish(&notes, handle).await
}

async fn start_engine(
    target: &SyncTarget,
    db_path: &Path,
) -> Result<(notelm_core::NoteService, SyncHandle), CliError> {
    let notes = open_notes(db_path)?;
    let session = SyncSession::new(target.user_id.clone(), Arc::new(target.remote()));
    let handle = SyncEngine::start(notes.clone(), session, SyncConfig::default()).await;
    Ok((notes, handle))
}

async fn finish(
    notes: &notelm_core::NoteService,
    handle: SyncHandle,
) -> Result<SyncSummary, CliError> {
    let stats = handle.stats().await?;
    let conflicts = handle.conflicts().await?;
    handle.shutdown().await?;

    Ok(SyncSummary {
        notes: notes.list_notes().await.len(),
        writes: stats.writes_succeeded,
        deletes: stats.deletes_succeeded,
        snapshots: stats.snapshots_applied,
        conflicts,
    })
}
