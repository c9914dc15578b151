//! In-process remote channel for tests and multi-device simulation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{RemoteChannel, RemoteSnapshot, SnapshotReceiver, UserId};
use crate::error::{Error, Result};
use crate::models::{Note, NoteId};

/// One accepted upsert, in arrival order.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    /// Namespace written to
    pub user_id: UserId,
    /// Document as written
    pub note: Note,
    /// Runtime instant at which the write was applied
    pub at: Instant,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<UserId, BTreeMap<NoteId, Note>>,
    subscribers: HashMap<UserId, Vec<mpsc::UnboundedSender<RemoteSnapshot>>>,
    writes: Vec<WriteRecord>,
    deletes: Vec<(UserId, NoteId)>,
    failing_calls: usize,
    failing_subscribes: usize,
    offline: bool,
    latency: Duration,
}

impl Inner {
    fn check_available(&mut self) -> Result<()> {
        if self.offline {
            return Err(Error::Remote("remote unavailable".to_string()));
        }
        if self.failing_calls > 0 {
            self.failing_calls -= 1;
            return Err(Error::Remote("injected failure".to_string()));
        }
        Ok(())
    }

    fn snapshot(&self, user_id: &UserId) -> RemoteSnapshot {
        self.collections
            .get(user_id)
            .map(|docs| RemoteSnapshot::new(docs.values().cloned()))
            .unwrap_or_default()
    }

    fn broadcast(&mut self, user_id: &UserId) {
        let snapshot = self.snapshot(user_id);
        if let Some(subscribers) = self.subscribers.get_mut(user_id) {
            subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }
}

/// Shared in-memory remote. Clones talk to the same collections.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRemote {
    /// Creates an empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes or deletes with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().failing_calls = count;
    }

    /// Fail the next `count` subscriptions.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.inner.lock().failing_subscribes = count;
    }

    /// Close every open snapshot stream for `user_id`.
    pub fn disconnect(&self, user_id: &UserId) {
        self.inner.lock().subscribers.remove(user_id);
    }

    /// Fail every write and delete until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Delay applied to each write and delete before it takes effect.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Current collection for `user_id`.
    pub fn snapshot(&self, user_id: &UserId) -> RemoteSnapshot {
        self.inner.lock().snapshot(user_id)
    }

    /// Accepted writes, oldest first.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.inner.lock().writes.clone()
    }

    /// Accepted writes for one note, oldest first.
    pub fn writes_for(&self, note_id: &NoteId) -> Vec<WriteRecord> {
        self.inner
            .lock()
            .writes
            .iter()
            .filter(|record| record.note.id == *note_id)
            .cloned()
            .collect()
    }

    /// Accepted deletes, oldest first.
    pub fn deletes(&self) -> Vec<(UserId, NoteId)> {
        self.inner.lock().deletes.clone()
    }

    /// Number of live subscriptions for `user_id`.
    pub fn subscriber_count(&self, user_id: &UserId) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(user_id)
            .map_or(0, |subscribers| {
                subscribers.iter().filter(|tx| !tx.is_closed()).count()
            })
    }

    async fn simulate_latency(&self) {
        let latency = self.inner.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl RemoteChannel for MemoryRemote {
    async fn subscribe(&self, user_id: &UserId) -> Result<SnapshotReceiver> {
        let mut inner = self.inner.lock();
        if inner.failing_subscribes > 0 {
            inner.failing_subscribes -= 1;
            return Err(Error::Remote("subscription refused".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        // Deliver current state before any later change.
        let _ = tx.send(inner.snapshot(user_id));
        inner
            .subscribers
            .entry(user_id.clone())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn write(&self, user_id: &UserId, note: &Note) -> Result<()> {
        self.inner.lock().check_available()?;
        self.simulate_latency().await;

        let mut inner = self.inner.lock();
        inner.writes.push(WriteRecord {
            user_id: user_id.clone(),
            note: note.clone(),
            at: Instant::now(),
        });

        let collection = inner.collections.entry(user_id.clone()).or_default();
        if collection.get(&note.id) == Some(note) {
            return Ok(());
        }
        collection.insert(note.id, note.clone());
        inner.broadcast(user_id);
        Ok(())
    }

    async fn delete(&self, user_id: &UserId, note_id: &NoteId) -> Result<()> {
        self.inner.lock().check_available()?;
        self.simulate_latency().await;

        let mut inner = self.inner.lock();
        inner.deletes.push((user_id.clone(), *note_id));
        let removed = inner
            .collections
            .get_mut(user_id)
            .and_then(|collection| collection.remove(note_id))
            .is_some();
        if removed {
            inner.broadcast(user_id);
        }
        Ok(())
    }
}
