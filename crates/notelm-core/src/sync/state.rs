//! Observable sync state.

use tokio::time::Instant;

/// Per-note sync state as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSyncState {
    /// Local version is newer than the watermark and nothing is scheduled.
    Unsynced,
    /// A debounced write is pending.
    ScheduledWrite,
    /// A write is in flight.
    Writing,
    /// Watermark matches the local version.
    Synced,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Whether the engine runs without a remote session.
    pub local_only: bool,
    /// Successful note writes.
    pub writes_succeeded: u64,
    /// Failed note write attempts.
    pub writes_failed: u64,
    /// Remote deletes that succeeded.
    pub deletes_succeeded: u64,
    /// Retries scheduled after failures.
    pub retries: u64,
    /// Snapshots applied to the store.
    pub snapshots_applied: u64,
    /// Conflicts resolved by last-writer-wins.
    pub conflicts: u64,
    /// Time of the last successful write or applied snapshot.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}
