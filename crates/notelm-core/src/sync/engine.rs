//! Sync engine actor.
//!
//! All bookkeeping (watermarks, pending timers, tombstones, retry counters)
//! is owned by a single task. Store events, remote snapshots, timer firings,
//! write completions and handle commands are multiplexed with
//! `tokio::select!`, so no two of them are ever processed concurrently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::{SnapshotPolicy, SyncConfig};
use super::state::{NoteSyncState, SyncStats};
use crate::error::{Error, Result};
use crate::models::{ConflictOutcome, Note, NoteId, SyncConflict};
use crate::remote::{RemoteChannel, RemoteSnapshot, SnapshotReceiver, UserId};
use crate::services::NoteService;
use crate::store::{RemoteApply, StoreEvent};
use crate::util::unix_millis_now;

/// Authenticated remote session the engine syncs through.
pub struct SyncSession<R> {
    /// Remote namespace
    pub user_id: UserId,
    /// Remote channel
    pub remote: Arc<R>,
}

impl<R> SyncSession<R> {
    /// Creates a session for `user_id` on `remote`.
    pub fn new(user_id: UserId, remote: Arc<R>) -> Self {
        Self { user_id, remote }
    }
}

impl<R> Clone for SyncSession<R> {
    fn clone(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            remote: Arc::clone(&self.remote),
        }
    }
}

/// Entry point for starting sync engines.
pub struct SyncEngine;

impl SyncEngine {
    /// Start an engine syncing `notes` through `session`.
    ///
    /// A failed subscription does not stop the engine; it is retried with
    /// the configured backoff.
    pub async fn start<R: RemoteChannel>(
        notes: NoteService,
        session: SyncSession<R>,
        config: SyncConfig,
    ) -> SyncHandle {
        run(notes, Some(session), config).await
    }

    /// Start an engine without a remote session.
    ///
    /// Edits are tracked but never written anywhere.
    pub async fn start_local(notes: NoteService, config: SyncConfig) -> SyncHandle {
        run::<LocalOnly>(notes, None, config).await
    }
}

/// Placeholder channel for local-only engines; never called.
struct LocalOnly;

impl RemoteChannel for LocalOnly {
    async fn subscribe(&self, _user_id: &UserId) -> Result<SnapshotReceiver> {
        Err(Error::Remote("no sync session".to_string()))
    }

    async fn write(&self, _user_id: &UserId, _note: &Note) -> Result<()> {
        Err(Error::Remote("no sync session".to_string()))
    }

    async fn delete(&self, _user_id: &UserId, _note_id: &NoteId) -> Result<()> {
        Err(Error::Remote("no sync session".to_string()))
    }
}

enum Command {
    Status(NoteId, oneshot::Sender<Option<NoteSyncState>>),
    Watermark(NoteId, oneshot::Sender<Option<i64>>),
    PendingWrites(oneshot::Sender<Vec<NoteId>>),
    Stats(oneshot::Sender<SyncStats>),
    Conflicts(oneshot::Sender<Vec<SyncConflict>>),
    Flush(oneshot::Sender<Result<()>>),
    Shutdown(oneshot::Sender<()>),
}

enum Internal {
    TimerFired {
        id: NoteId,
        generation: u64,
    },
    WriteDone {
        id: NoteId,
        updated_at: i64,
        result: Result<()>,
    },
    DeleteDone {
        id: NoteId,
        result: Result<()>,
    },
    Subscribed(Result<SnapshotReceiver>),
}

/// Lower bound between resubscribe attempts.
const MIN_RESUBSCRIBE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Write,
    Delete,
}

struct PendingTimer {
    generation: u64,
    kind: TimerKind,
    handle: JoinHandle<()>,
}

/// Cloneable handle for querying and controlling a running engine.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SyncHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    /// Sync state of one note, or `None` if it does not exist locally.
    pub async fn status(&self, id: &NoteId) -> Result<Option<NoteSyncState>> {
        let id = *id;
        self.request(|reply| Command::Status(id, reply)).await
    }

    /// Watermark of one note.
    pub async fn watermark(&self, id: &NoteId) -> Result<Option<i64>> {
        let id = *id;
        self.request(|reply| Command::Watermark(id, reply)).await
    }

    /// Notes with a scheduled write, sorted by id.
    pub async fn pending_writes(&self) -> Result<Vec<NoteId>> {
        self.request(Command::PendingWrites).await
    }

    /// Engine statistics.
    pub async fn stats(&self) -> Result<SyncStats> {
        self.request(Command::Stats).await
    }

    /// Conflicts resolved by last-writer-wins, oldest first.
    pub async fn conflicts(&self) -> Result<Vec<SyncConflict>> {
        self.request(Command::Conflicts).await
    }

    /// Write every unsynced note now and wait for the writes to settle.
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await?
    }

    /// Stop the engine. Pending timers are dropped.
    pub async fn shutdown(self) -> Result<()> {
        self.request(Command::Shutdown).await
    }

    /// Whether the engine task is still running.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

async fn run<R: RemoteChannel>(
    notes: NoteService,
    session: Option<SyncSession<R>>,
    config: SyncConfig,
) -> SyncHandle {
    let events = notes.subscribe().await;

    let mut subscribe_error = None;
    let snapshots = match &session {
        Some(session) => match session.remote.subscribe(&session.user_id).await {
            Ok(snapshots) => Some(snapshots),
            Err(error) => {
                subscribe_error = Some(error);
                None
            }
        },
        None => {
            tracing::info!("Running in local-only mode (no sync session)");
            None
        }
    };

    let (command_tx, commands) = mpsc::unbounded_channel();
    let (internal_tx, internal) = mpsc::unbounded_channel();

    let mut worker = Worker {
        stats: SyncStats {
            local_only: session.is_none(),
            ..SyncStats::default()
        },
        notes,
        session,
        config,
        watermarks: HashMap::new(),
        timers: HashMap::new(),
        next_generation: 0,
        writing: HashMap::new(),
        dirty: HashSet::new(),
        diverged: HashSet::new(),
        awaiting_echo: HashSet::new(),
        last_snapshot: HashMap::new(),
        deleting: HashSet::new(),
        delete_after_write: HashSet::new(),
        tombstones: HashMap::new(),
        attempts: HashMap::new(),
        conflicts: VecDeque::new(),
        flush_waiters: Vec::new(),
        flush_error: None,
        subscribe_attempts: 0,
        resubscribe: None,
        internal_tx,
    };
    worker.schedule_startup().await;
    if let Some(error) = subscribe_error {
        worker.schedule_resubscribe(&error);
    }

    tokio::spawn(worker.run(commands, events, snapshots, internal));
    SyncHandle {
        commands: command_tx,
    }
}

struct Worker<R> {
    notes: NoteService,
    session: Option<SyncSession<R>>,
    config: SyncConfig,
    /// Last `updated_at` known to match the remote, per note.
    watermarks: HashMap<NoteId, i64>,
    timers: HashMap<NoteId, PendingTimer>,
    next_generation: u64,
    /// Version captured by the in-flight write; at most one per note.
    writing: HashMap<NoteId, i64>,
    /// Notes whose timer fired while a write was in flight.
    dirty: HashSet<NoteId>,
    /// Notes the remote holds an older, different version of.
    diverged: HashSet<NoteId>,
    /// Written notes not yet seen in a snapshot.
    awaiting_echo: HashSet<NoteId>,
    /// Versions held by the most recent snapshot.
    last_snapshot: HashMap<NoteId, i64>,
    deleting: HashSet<NoteId>,
    delete_after_write: HashSet<NoteId>,
    /// Locally deleted notes; `true` once the remote delete succeeded.
    tombstones: HashMap<NoteId, bool>,
    /// Consecutive failed attempts for the current write or delete.
    attempts: HashMap<NoteId, u32>,
    conflicts: VecDeque<SyncConflict>,
    stats: SyncStats,
    flush_waiters: Vec<oneshot::Sender<Result<()>>>,
    flush_error: Option<String>,
    /// Consecutive failed subscriptions.
    subscribe_attempts: u32,
    resubscribe: Option<JoinHandle<()>>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl<R: RemoteChannel> Worker<R> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<StoreEvent>,
        mut snapshots: Option<SnapshotReceiver>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            // Local events first, so commands observe every edit made before them.
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.handle_event(event),
                Some(message) = internal.recv() => match message {
                    Internal::Subscribed(Ok(receiver)) => {
                        tracing::info!("Resubscribed to remote snapshots");
                        self.subscribe_attempts = 0;
                        self.resubscribe = None;
                        snapshots = Some(receiver);
                    }
                    Internal::Subscribed(Err(error)) => {
                        self.resubscribe = None;
                        self.schedule_resubscribe(&error);
                    }
                    message => self.handle_internal(message).await,
                },
                snapshot = next_snapshot(&mut snapshots) => match snapshot {
                    Some(snapshot) => self.apply_snapshot(snapshot).await,
                    None => {
                        snapshots = None;
                        self.schedule_resubscribe(&Error::Remote(
                            "snapshot stream closed".to_string(),
                        ));
                    }
                },
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command).await {
                        break;
                    }
                }
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
        if let Some(handle) = self.resubscribe.take() {
            handle.abort();
        }
        tracing::debug!("Sync engine stopped");
    }

    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Status(id, reply) => {
                let _ = reply.send(self.status(&id).await);
            }
            Command::Watermark(id, reply) => {
                let _ = reply.send(self.watermarks.get(&id).copied());
            }
            Command::PendingWrites(reply) => {
                let mut pending: Vec<NoteId> = self
                    .timers
                    .iter()
                    .filter(|(_, timer)| timer.kind == TimerKind::Write)
                    .map(|(id, _)| *id)
                    .collect();
                pending.sort();
                let _ = reply.send(pending);
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.stats.clone());
            }
            Command::Conflicts(reply) => {
                let _ = reply.send(self.conflicts.iter().cloned().collect());
            }
            Command::Flush(reply) => self.flush(reply).await,
            Command::Shutdown(reply) => {
                tracing::info!("Sync engine shutting down");
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn status(&self, id: &NoteId) -> Option<NoteSyncState> {
        let updated_at = self.notes.lock().await.get(id)?.updated_at;

        let state = if self.writing.contains_key(id) {
            NoteSyncState::Writing
        } else if self
            .timers
            .get(id)
            .is_some_and(|timer| timer.kind == TimerKind::Write)
        {
            NoteSyncState::ScheduledWrite
        } else if self.is_covered(id, updated_at) {
            NoteSyncState::Synced
        } else {
            NoteSyncState::Unsynced
        };
        Some(state)
    }

    /// True when the watermark covers `updated_at` and the remote agrees.
    fn is_covered(&self, id: &NoteId, updated_at: i64) -> bool {
        !self.diverged.contains(id)
            && self
                .watermarks
                .get(id)
                .is_some_and(|watermark| updated_at <= *watermark)
    }

    async fn schedule_startup(&mut self) {
        if self.session.is_none() {
            return;
        }
        let ids: Vec<NoteId> = self
            .notes
            .lock()
            .await
            .notes()
            .iter()
            .map(|note| note.id)
            .collect();
        if !ids.is_empty() {
            tracing::debug!("Scheduling {} notes with no known remote version", ids.len());
        }
        for id in ids {
            self.schedule(id, TimerKind::Write, self.config.debounce);
        }
    }

    fn handle_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Created { id, updated_at } | StoreEvent::Updated { id, updated_at } => {
                self.attempts.remove(&id);
                let in_flight = self
                    .writing
                    .get(&id)
                    .is_some_and(|captured| updated_at <= *captured);
                if self.session.is_none() || in_flight || self.is_covered(&id, updated_at) {
                    return;
                }
                tracing::debug!("Scheduling write for note {} ({})", id, updated_at);
                self.schedule(id, TimerKind::Write, self.config.debounce);
            }
            StoreEvent::Deleted { id } => {
                self.cancel_timer(&id);
                self.watermarks.remove(&id);
                self.attempts.remove(&id);
                self.dirty.remove(&id);
                self.diverged.remove(&id);
                self.awaiting_echo.remove(&id);
                if self.session.is_none() {
                    return;
                }

                self.tombstones.insert(id, false);
                if self.writing.contains_key(&id) {
                    self.delete_after_write.insert(id);
                } else {
                    self.start_delete(id);
                }
            }
        }
    }

    async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::TimerFired { id, generation } => {
                let kind = match self.timers.get(&id) {
                    Some(timer) if timer.generation == generation => timer.kind,
                    _ => return,
                };
                self.timers.remove(&id);
                match kind {
                    TimerKind::Write => self.fire_write(id).await,
                    TimerKind::Delete => self.start_delete(id),
                }
            }
            Internal::WriteDone {
                id,
                updated_at,
                result,
            } => self.finish_write(id, updated_at, result).await,
            Internal::DeleteDone { id, result } => self.finish_delete(id, result),
            Internal::Subscribed(_) => {}
        }
        self.maybe_finish_flush();
    }

    async fn fire_write(&mut self, id: NoteId) {
        if self.session.is_none() {
            return;
        }
        if self.writing.contains_key(&id) {
            self.dirty.insert(id);
            return;
        }

        let note = self.notes.lock().await.get(&id).cloned();
        let Some(note) = note else {
            tracing::debug!("Skipping write for note {} (no longer exists)", id);
            return;
        };
        if self.is_covered(&id, note.updated_at) {
            return;
        }
        self.start_write(note);
    }

    fn start_write(&mut self, note: Note) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let id = note.id;
        let updated_at = note.updated_at;
        let tx = self.internal_tx.clone();
        self.writing.insert(id, updated_at);

        tracing::debug!("Writing note {} ({})", id, updated_at);
        tokio::spawn(async move {
            let result = session.remote.write(&session.user_id, &note).await;
            let _ = tx.send(Internal::WriteDone {
                id,
                updated_at,
                result,
            });
        });
    }

    async fn finish_write(&mut self, id: NoteId, updated_at: i64, result: Result<()>) {
        self.writing.remove(&id);
        let deleted = self.tombstones.contains_key(&id);

        match result {
            Ok(()) => {
                self.stats.writes_succeeded += 1;
                self.stats.last_sync_time = Some(Instant::now());
                self.attempts.remove(&id);
                if !deleted {
                    self.raise_watermark(id, updated_at);
                    self.diverged.remove(&id);
                    let echoed = self
                        .last_snapshot
                        .get(&id)
                        .is_some_and(|seen| *seen >= updated_at);
                    if !echoed {
                        self.awaiting_echo.insert(id);
                    }
                }
                tracing::debug!("Note {} synced at {}", id, updated_at);
            }
            Err(error) => {
                self.stats.writes_failed += 1;
                self.stats.last_error = Some(error.to_string());
                self.flush_error = Some(error.to_string());
                if !deleted && !self.dirty.contains(&id) {
                    self.retry_after_failure(id, TimerKind::Write, &error);
                }
            }
        }

        if self.delete_after_write.remove(&id) {
            self.start_delete(id);
        } else if self.dirty.remove(&id) {
            self.fire_write(id).await;
        }
    }

    fn start_delete(&mut self, id: NoteId) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let tx = self.internal_tx.clone();
        self.deleting.insert(id);

        tracing::debug!("Deleting note {} remotely", id);
        tokio::spawn(async move {
            let result = session.remote.delete(&session.user_id, &id).await;
            let _ = tx.send(Internal::DeleteDone { id, result });
        });
    }

    fn finish_delete(&mut self, id: NoteId, result: Result<()>) {
        self.deleting.remove(&id);
        match result {
            Ok(()) => {
                self.stats.deletes_succeeded += 1;
                self.attempts.remove(&id);
                if let Some(confirmed) = self.tombstones.get_mut(&id) {
                    *confirmed = true;
                }
            }
            Err(error) => {
                self.stats.last_error = Some(error.to_string());
                self.flush_error = Some(error.to_string());
                self.retry_after_failure(id, TimerKind::Delete, &error);
            }
        }
    }

    fn retry_after_failure(&mut self, id: NoteId, kind: TimerKind, error: &Error) {
        let failed = {
            let attempts = self.attempts.entry(id).or_insert(0);
            *attempts += 1;
            *attempts
        };

        if !self.config.retry.should_retry(failed) {
            tracing::error!(
                "Giving up on note {} after {} failed attempts: {}",
                id,
                failed,
                error
            );
            return;
        }
        // A newer local edit already has its own timer.
        if self.timers.contains_key(&id) {
            return;
        }

        let delay = self.config.retry.delay_for_attempt(failed);
        tracing::warn!(
            "Sync of note {} failed (attempt {}): {}. Retrying in {:?}",
            id,
            failed,
            error,
            delay
        );
        self.stats.retries += 1;
        self.schedule(id, kind, delay);
    }

    fn schedule_resubscribe(&mut self, error: &Error) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.subscribe_attempts += 1;
        self.stats.last_error = Some(error.to_string());
        let delay = self
            .config
            .retry
            .delay_for_attempt(self.subscribe_attempts)
            .max(MIN_RESUBSCRIBE_DELAY);
        tracing::warn!(
            "Remote subscription lost (attempt {}): {}. Resubscribing in {:?}",
            self.subscribe_attempts,
            error,
            delay
        );

        let tx = self.internal_tx.clone();
        self.resubscribe = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = session.remote.subscribe(&session.user_id).await;
            let _ = tx.send(Internal::Subscribed(result));
        }));
    }

    async fn apply_snapshot(&mut self, snapshot: RemoteSnapshot) {
        let incoming = snapshot
            .notes()
            .map(|note| (note.id, note.updated_at))
            .collect();
        let prior = std::mem::replace(&mut self.last_snapshot, incoming);
        match self.config.snapshot_policy {
            SnapshotPolicy::Merge => self.merge_snapshot(&snapshot, &prior).await,
            SnapshotPolicy::Replace => self.replace_with_snapshot(snapshot).await,
        }

        // Drop tombstones once the remote confirms the delete.
        self.tombstones
            .retain(|id, confirmed| !*confirmed || self.last_snapshot.contains_key(id));
    }

    /// `prior` holds the versions of the snapshot applied before this one.
    async fn merge_snapshot(
        &mut self,
        snapshot: &RemoteSnapshot,
        prior: &HashMap<NoteId, i64>,
    ) {
        let notes = self.notes.clone();
        let mut store = notes.lock().await;

        let mut changes = RemoteApply::default();
        let mut watermark_updates = Vec::new();
        let mut kept_local = Vec::new();
        let mut reupload = Vec::new();
        let mut conflicts = Vec::new();

        for remote in snapshot.notes() {
            if self.tombstones.contains_key(&remote.id) {
                continue;
            }
            let previous = self.watermarks.get(&remote.id).copied();
            if !previous.is_some_and(|w| remote.updated_at < w) {
                self.awaiting_echo.remove(&remote.id);
            }

            match store.get(&remote.id) {
                None => changes.upserts.push(remote.clone()),
                Some(local) if remote.updated_at >= local.updated_at => {
                    if remote != local {
                        if previous.is_some_and(|w| local.updated_at > w) {
                            conflicts.push((local.updated_at, remote, ConflictOutcome::TookRemote));
                        }
                        changes.upserts.push(remote.clone());
                    }
                }
                Some(local) => {
                    // A version the remote already held, or one scanned before
                    // our write landed, is not a new write by another device.
                    let changed = prior.get(&remote.id).map_or_else(
                        || !self.awaiting_echo.contains(&remote.id),
                        |seen| *seen != remote.updated_at,
                    );
                    if !changed {
                        continue;
                    }
                    self.awaiting_echo.remove(&remote.id);
                    if remote != local {
                        // Our own echo carries the watermark version.
                        if previous.is_some_and(|w| remote.updated_at != w) {
                            conflicts.push((local.updated_at, remote, ConflictOutcome::KeptLocal));
                        }
                        if previous.is_some_and(|w| local.updated_at <= w) {
                            reupload.push(remote.id);
                        }
                    }
                    kept_local.push(remote.id);
                }
            }
            watermark_updates.push((remote.id, remote.updated_at));
        }

        let mut removals = Vec::new();
        let mut forget = Vec::new();
        for local in store.notes() {
            if snapshot.contains(&local.id) {
                continue;
            }
            let Some(watermark) = self.watermarks.get(&local.id).copied() else {
                continue;
            };
            if self.writing.contains_key(&local.id) || self.awaiting_echo.contains(&local.id) {
                continue;
            }
            if local.updated_at <= watermark {
                removals.push(local.id);
            } else {
                // Deleted remotely but edited here: upload again.
                forget.push(local.id);
            }
        }
        changes.removals.clone_from(&removals);

        if let Err(error) = store.apply_remote(changes) {
            tracing::warn!("Failed to apply remote snapshot locally: {}", error);
            return;
        }

        for (id, updated_at) in watermark_updates {
            self.raise_watermark(id, updated_at);
        }
        for id in reupload {
            self.diverged.insert(id);
        }
        for id in forget {
            self.watermarks.remove(&id);
        }
        for id in &removals {
            tracing::debug!("Note {} was deleted remotely", id);
            self.forget_note(id);
        }

        let synced: Vec<NoteId> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.kind == TimerKind::Write)
            .map(|(id, _)| *id)
            .filter(|id| {
                store
                    .get(id)
                    .is_some_and(|note| self.is_covered(id, note.updated_at))
            })
            .collect();
        drop(store);

        for id in synced {
            self.cancel_timer(&id);
        }
        for id in kept_local {
            if !self.timers.contains_key(&id) && !self.writing.contains_key(&id) {
                let needs_write = self
                    .notes
                    .get_note(&id)
                    .await
                    .is_some_and(|note| !self.is_covered(&id, note.updated_at));
                if needs_write {
                    self.schedule(id, TimerKind::Write, self.config.debounce);
                }
            }
        }
        for (local_updated_at, remote, outcome) in conflicts {
            self.record_conflict(remote.id, local_updated_at, remote.updated_at, outcome);
        }

        self.stats.snapshots_applied += 1;
        self.stats.last_sync_time = Some(Instant::now());
    }

    async fn replace_with_snapshot(&mut self, snapshot: RemoteSnapshot) {
        if snapshot.is_empty() {
            tracing::debug!("Ignoring empty remote snapshot");
            return;
        }

        let notes: Vec<Note> = snapshot
            .into_notes()
            .into_iter()
            .rev()
            .filter(|note| !self.tombstones.contains_key(&note.id))
            .collect();
        let incoming: Vec<(NoteId, i64)> =
            notes.iter().map(|note| (note.id, note.updated_at)).collect();

        if let Err(error) = self.notes.replace_all(notes).await {
            tracing::warn!("Failed to replace local notes with snapshot: {}", error);
            return;
        }

        let present: HashSet<NoteId> = incoming.iter().map(|(id, _)| *id).collect();
        let stale: Vec<NoteId> = self
            .watermarks
            .keys()
            .chain(self.timers.keys())
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        for id in &stale {
            self.forget_note(id);
        }
        for (id, updated_at) in incoming {
            self.raise_watermark(id, updated_at);
            self.diverged.remove(&id);
            self.awaiting_echo.remove(&id);
            self.cancel_timer(&id);
        }

        self.stats.snapshots_applied += 1;
        self.stats.last_sync_time = Some(Instant::now());
    }

    async fn flush(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.session.is_none() {
            let _ = reply.send(Ok(()));
            return;
        }
        if self.flush_waiters.is_empty() {
            self.flush_error = None;
        }

        // Includes deletes that exhausted their retries.
        let unconfirmed: Vec<NoteId> = self
            .tombstones
            .iter()
            .filter(|(id, confirmed)| {
                !**confirmed && !self.deleting.contains(*id) && !self.delete_after_write.contains(*id)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in unconfirmed {
            self.cancel_timer(&id);
            self.attempts.remove(&id);
            self.start_delete(id);
        }

        let unsynced: Vec<Note> = self
            .notes
            .lock()
            .await
            .notes()
            .iter()
            .filter(|note| !self.is_covered(&note.id, note.updated_at))
            .cloned()
            .collect();
        tracing::debug!("Flushing {} unsynced notes", unsynced.len());

        for note in unsynced {
            self.cancel_timer(&note.id);
            self.attempts.remove(&note.id);
            if self.writing.contains_key(&note.id) {
                self.dirty.insert(note.id);
            } else {
                self.start_write(note);
            }
        }

        self.flush_waiters.push(reply);
        self.maybe_finish_flush();
    }

    fn maybe_finish_flush(&mut self) {
        if self.flush_waiters.is_empty() || !self.writing.is_empty() || !self.deleting.is_empty() {
            return;
        }
        let error = self.flush_error.take();
        for waiter in self.flush_waiters.drain(..) {
            let result = error.clone().map_or(Ok(()), |message| Err(Error::Remote(message)));
            let _ = waiter.send(result);
        }
    }

    fn raise_watermark(&mut self, id: NoteId, updated_at: i64) {
        let watermark = self.watermarks.entry(id).or_insert(updated_at);
        *watermark = (*watermark).max(updated_at);
    }

    fn forget_note(&mut self, id: &NoteId) {
        self.cancel_timer(id);
        self.watermarks.remove(id);
        self.attempts.remove(id);
        self.dirty.remove(id);
        self.diverged.remove(id);
        self.awaiting_echo.remove(id);
    }

    fn record_conflict(
        &mut self,
        note_id: NoteId,
        local_updated_at: i64,
        incoming_updated_at: i64,
        outcome: ConflictOutcome,
    ) {
        tracing::info!(
            "Resolved sync conflict for note {} ({:?}, local {}, remote {})",
            note_id,
            outcome,
            local_updated_at,
            incoming_updated_at
        );
        self.stats.conflicts += 1;
        self.conflicts.push_back(SyncConflict {
            note_id,
            local_updated_at,
            incoming_updated_at,
            resolved_at: unix_millis_now(),
            outcome,
        });
        while self.conflicts.len() > self.config.conflict_history {
            self.conflicts.pop_front();
        }
    }

    fn schedule(&mut self, id: NoteId, kind: TimerKind, delay: Duration) {
        self.cancel_timer(&id);
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.internal_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::TimerFired { id, generation });
        });
        self.timers.insert(
            id,
            PendingTimer {
                generation,
                kind,
                handle,
            },
        );
    }

    fn cancel_timer(&mut self, id: &NoteId) {
        if let Some(timer) = self.timers.remove(id) {
            timer.handle.abort();
        }
    }
}

async fn next_snapshot(snapshots: &mut Option<SnapshotReceiver>) -> Option<RemoteSnapshot> {
    match snapshots {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
