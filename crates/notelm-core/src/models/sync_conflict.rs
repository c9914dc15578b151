//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::note::NoteId;

/// How a last-writer-wins conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictOutcome {
    /// The local unsynced version was newer and was kept
    KeptLocal,
    /// The remote version was newer and replaced an unsynced local edit
    TookRemote,
}

impl fmt::Display for ConflictOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeptLocal => f.write_str("kept_local"),
            Self::TookRemote => f.write_str("took_remote"),
        }
    }
}

/// Recorded sync conflict resolved by last-writer-wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Note involved in the conflict
    pub note_id: NoteId,
    /// Local version's timestamp when the snapshot arrived
    pub local_updated_at: i64,
    /// Incoming remote version's timestamp
    pub incoming_updated_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Which side won
    pub outcome: ConflictOutcome,
}
