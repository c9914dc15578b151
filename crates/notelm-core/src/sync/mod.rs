//! Note synchronization between the local store and a remote channel.
//!
//! Local edits are written to the remote after a quiet period (debounce),
//! one full document per note. Remote snapshots are merged back into the
//! store through a path that never produces local change events, so they
//! cannot echo back as writes.

mod config;
mod engine;
mod state;

pub use config::{RetryConfig, SnapshotPolicy, SyncConfig, DEFAULT_DEBOUNCE};
pub use engine::{SyncEngine, SyncHandle, SyncSession};
pub use state::{NoteSyncState, SyncStats};
