//! Engine scenarios driven on tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use notelm_core::clock::ManualClock;
use notelm_core::models::{ConflictOutcome, Note, NotePatch};
use notelm_core::remote::{MemoryRemote, RemoteChannel, RemoteSnapshot, SnapshotReceiver, UserId};
use notelm_core::sync::{
    NoteSyncState, RetryConfig, SnapshotPolicy, SyncConfig, SyncEngine, SyncHandle, SyncSession,
};
use notelm_core::{Error, NoteId, NoteService};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

fn alice() -> UserId {
    UserId::new("alice").unwrap()
}

fn device(start: i64) -> (NoteService, ManualClock) {
    let clock = ManualClock::new(start);
    let notes = NoteService::in_memory_with_clock(Arc::new(clock.clone())).unwrap();
    (notes, clock)
}

async fn start(notes: &NoteService, remote: &MemoryRemote, config: SyncConfig) -> SyncHandle {
    let session = SyncSession::new(alice(), Arc::new(remote.clone()));
    SyncEngine::start(notes.clone(), session, config).await
}

/// Let every ready task run without crossing any debounce deadline.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

fn content(text: &str) -> NotePatch {
    NotePatch::default().content(text)
}

/// Write `note` as another device would.
async fn remote_edit(remote: &MemoryRemote, note: &Note) {
    remote.write(&alice(), note).await.unwrap();
    settle().await;
}

/// Remote whose snapshots arrive `lag` late. After every accepted write it
/// also delivers the collection as it was scanned before that write landed.
#[derive(Clone)]
struct LaggingRemote {
    inner: MemoryRemote,
    lag: Duration,
    streams: Arc<Mutex<Vec<mpsc::UnboundedSender<RemoteSnapshot>>>>,
}

impl LaggingRemote {
    fn new(inner: MemoryRemote, lag: Duration) -> Self {
        Self {
            inner,
            lag,
            streams: Arc::default(),
        }
    }
}

impl RemoteChannel for LaggingRemote {
    async fn subscribe(&self, user_id: &UserId) -> notelm_core::Result<SnapshotReceiver> {
        let mut upstream = self.inner.subscribe(user_id).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().push(tx.clone());
        let lag = self.lag;
        tokio::spawn(async move {
            while let Some(snapshot) = upstream.recv().await {
                sleep(lag).await;
                if tx.send(snapshot).is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn write(&self, user_id: &UserId, note: &Note) -> notelm_core::Result<()> {
        let scanned = self.inner.snapshot(user_id);
        self.inner.write(user_id, note).await?;
        let streams = self.streams.lock().clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1)).await;
            for tx in streams {
                let _ = tx.send(scanned.clone());
            }
        });
        Ok(())
    }

    async fn delete(&self, user_id: &UserId, note_id: &NoteId) -> notelm_core::Result<()> {
        self.inner.delete(user_id, note_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_is_written_once_after_quiet_period() {
    let remote = MemoryRemote::new();
    let (notes, clock) = device(0);
    let _engine = start(&notes, &remote, SyncConfig::default()).await;
    let started = Instant::now();

    let note = notes.create_note().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    clock.set(100);
    notes.update_note(&note.id, content("A")).await.unwrap();
    sleep(Duration::from_millis(200)).await;
    clock.set(300);
    notes.update_note(&note.id, content("AB")).await.unwrap();

    sleep(Duration::from_millis(5000)).await;

    let writes = remote.writes_for(&note.id);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].note.content, "AB");
    let elapsed = writes[0].at.duration_since(started);
    assert!(
        elapsed >= Duration::from_millis(2300) && elapsed < Duration::from_millis(2310),
        "write fired at {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn watermark_tracks_write_and_empty_update_rewrites() {
    let remote = MemoryRemote::new();
    let (notes, clock) = device(10);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let note = notes.create_note_with(content("x")).await.unwrap();
    sleep(Duration::from_millis(2500)).await;

    assert_eq!(remote.writes_for(&note.id).len(), 1);
    assert_eq!(engine.watermark(&note.id).await.unwrap(), Some(note.updated_at));
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Synced)
    );

    clock.advance(5);
    let touched = notes.update_note(&note.id, NotePatch::default()).await.unwrap();
    assert!(touched.updated_at > note.updated_at);
    sleep(Duration::from_millis(2500)).await;

    let writes = remote.writes_for(&note.id);
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].note.updated_at, touched.updated_at);
    assert_eq!(
        engine.watermark(&note.id).await.unwrap(),
        Some(touched.updated_at)
    );
}

#[tokio::test(start_paused = true)]
async fn applying_a_snapshot_never_schedules_a_write() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let mut foreign = Note::new(42);
    foreign.content = "from another device".to_string();
    remote_edit(&remote, &foreign).await;

    assert_eq!(notes.get_note(&foreign.id).await, Some(foreign.clone()));
    assert!(engine.pending_writes().await.unwrap().is_empty());
    assert_eq!(
        engine.status(&foreign.id).await.unwrap(),
        Some(NoteSyncState::Synced)
    );

    sleep(Duration::from_millis(10_000)).await;
    assert_eq!(remote.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn deleting_before_the_timer_fires_prevents_the_write() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let note = notes.create_note_with(content("draft")).await.unwrap();
    sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.pending_writes().await.unwrap(), vec![note.id]);

    notes.delete_note(&note.id).await.unwrap();
    settle().await;
    assert!(engine.pending_writes().await.unwrap().is_empty());

    sleep(Duration::from_millis(5000)).await;
    assert!(remote.writes_for(&note.id).is_empty());
    assert!(!remote.snapshot(&alice()).contains(&note.id));
    assert_eq!(engine.watermark(&note.id).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn two_devices_converge_on_the_last_edit() {
    let remote = MemoryRemote::new();
    let (device_a, clock_a) = device(0);
    let (device_b, clock_b) = device(0);
    let engine_a = start(&device_a, &remote, SyncConfig::default()).await;
    let engine_b = start(&device_b, &remote, SyncConfig::default()).await;

    let note = device_a.create_note().await.unwrap();
    engine_a.flush().await.unwrap();
    settle().await;
    assert!(device_b.get_note(&note.id).await.is_some());

    clock_a.set(10);
    device_a.update_note(&note.id, content("A")).await.unwrap();
    engine_a.flush().await.unwrap();
    settle().await;
    assert_eq!(device_b.get_note(&note.id).await.unwrap().content, "A");

    clock_b.set(20);
    device_b.update_note(&note.id, content("B")).await.unwrap();
    engine_b.flush().await.unwrap();
    settle().await;

    let on_a = device_a.get_note(&note.id).await.unwrap();
    let on_b = device_b.get_note(&note.id).await.unwrap();
    assert_eq!(on_a.content, "B");
    assert_eq!(on_b.content, "B");
    assert_eq!(on_a.updated_at, 20);
    assert_eq!(engine_a.watermark(&note.id).await.unwrap(), Some(20));
    assert!(engine_a.pending_writes().await.unwrap().is_empty());
    assert!(engine_b.pending_writes().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_with_backoff() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;
    remote.fail_next(1);

    let note = notes.create_note_with(content("retry me")).await.unwrap();
    sleep(Duration::from_millis(2100)).await;
    assert!(remote.writes_for(&note.id).is_empty());
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::ScheduledWrite)
    );

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(remote.writes_for(&note.id).len(), 1);
    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.writes_failed, 1);
    assert_eq!(stats.retries, 1);
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Synced)
    );
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_gives_up_after_bounded_attempts() {
    let remote = MemoryRemote::new();
    let (notes, clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;
    remote.set_offline(true);

    let note = notes.create_note_with(content("offline")).await.unwrap();
    sleep(Duration::from_secs(60)).await;

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.writes_failed, 3);
    assert_eq!(stats.retries, 2);
    assert!(stats.last_error.is_some());
    assert!(engine.pending_writes().await.unwrap().is_empty());
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Unsynced)
    );

    // The next local edit starts a fresh attempt.
    remote.set_offline(false);
    clock.set(100);
    notes.update_note(&note.id, content("online")).await.unwrap();
    sleep(Duration::from_millis(2500)).await;

    assert_eq!(remote.snapshot(&alice()).get(&note.id).unwrap().content, "online");
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Synced)
    );
}

#[tokio::test(start_paused = true)]
async fn local_only_mode_tracks_but_never_writes() {
    let (notes, _clock) = device(0);
    let engine = SyncEngine::start_local(notes.clone(), SyncConfig::default()).await;

    let note = notes.create_note_with(content("private")).await.unwrap();
    sleep(Duration::from_secs(10)).await;

    assert!(engine.stats().await.unwrap().local_only);
    assert!(engine.pending_writes().await.unwrap().is_empty());
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Unsynced)
    );
    engine.flush().await.unwrap();
    assert_eq!(notes.get_note(&note.id).await.unwrap().content, "private");
}

#[tokio::test(start_paused = true)]
async fn newer_local_edit_survives_an_older_snapshot() {
    let remote = MemoryRemote::new();
    let (notes, clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let note = notes.create_note().await.unwrap();
    engine.flush().await.unwrap();
    settle().await;

    clock.set(50);
    notes.update_note(&note.id, content("local")).await.unwrap();

    let mut older = note.clone();
    older.content = "remote but older".to_string();
    older.updated_at = 5;
    remote_edit(&remote, &older).await;

    assert_eq!(notes.get_note(&note.id).await.unwrap().content, "local");
    let conflicts = engine.conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].outcome, ConflictOutcome::KeptLocal);
    assert_eq!(conflicts[0].local_updated_at, 50);
    assert_eq!(conflicts[0].incoming_updated_at, 5);

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(remote.snapshot(&alice()).get(&note.id).unwrap().content, "local");
}

#[tokio::test(start_paused = true)]
async fn newer_remote_version_replaces_unsynced_edit() {
    let remote = MemoryRemote::new();
    let (notes, clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let note = notes.create_note().await.unwrap();
    engine.flush().await.unwrap();
    settle().await;

    clock.set(50);
    notes.update_note(&note.id, content("mine")).await.unwrap();

    let mut newer = note.clone();
    newer.content = "theirs".to_string();
    newer.updated_at = 100;
    remote_edit(&remote, &newer).await;

    assert_eq!(notes.get_note(&note.id).await.unwrap(), newer);
    assert!(engine.pending_writes().await.unwrap().is_empty());
    let conflicts = engine.conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].outcome, ConflictOutcome::TookRemote);

    sleep(Duration::from_secs(5)).await;
    // The initial flush and the other device's write only.
    assert_eq!(remote.writes_for(&note.id).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn remote_delete_removes_synced_note() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let synced = notes.create_note_with(content("synced")).await.unwrap();
    engine.flush().await.unwrap();
    settle().await;
    let unsynced = notes.create_note_with(content("fresh")).await.unwrap();

    remote.delete(&alice(), &synced.id).await.unwrap();
    settle().await;

    assert!(notes.get_note(&synced.id).await.is_none());
    assert!(notes.get_note(&unsynced.id).await.is_some());
    assert_eq!(engine.pending_writes().await.unwrap(), vec![unsynced.id]);
}

#[tokio::test(start_paused = true)]
async fn local_delete_is_propagated_and_not_resurrected() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let doomed = notes.create_note_with(content("doomed")).await.unwrap();
    engine.flush().await.unwrap();
    settle().await;

    remote.fail_next(1);
    notes.delete_note(&doomed.id).await.unwrap();
    settle().await;

    // Another device writes while the remote still holds the deleted note.
    let other = Note::new(7);
    remote_edit(&remote, &other).await;
    assert!(remote.snapshot(&alice()).contains(&doomed.id));
    assert!(notes.get_note(&doomed.id).await.is_none());
    assert!(notes.get_note(&other.id).await.is_some());

    sleep(Duration::from_millis(1000)).await;
    assert!(!remote.snapshot(&alice()).contains(&doomed.id));
    assert_eq!(engine.stats().await.unwrap().deletes_succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn startup_uploads_only_notes_the_remote_lacks() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let already_remote = notes.create_note_with(content("synced")).await.unwrap();
    let offline_edit = notes.create_note_with(content("offline")).await.unwrap();
    remote.write(&alice(), &already_remote).await.unwrap();

    let engine = start(&notes, &remote, SyncConfig::default()).await;
    settle().await;
    assert_eq!(engine.pending_writes().await.unwrap(), vec![offline_edit.id]);

    sleep(Duration::from_millis(2500)).await;
    assert_eq!(remote.writes_for(&already_remote.id).len(), 1);
    assert_eq!(remote.writes_for(&offline_edit.id).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn edit_during_in_flight_write_is_written_next() {
    let remote = MemoryRemote::new();
    remote.set_latency(Duration::from_millis(1000));
    let (notes, clock) = device(0);
    let config = SyncConfig::default().with_debounce(Duration::from_millis(200));
    let engine = start(&notes, &remote, config).await;

    let note = notes.create_note_with(content("one")).await.unwrap();
    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Writing)
    );

    clock.set(10);
    let second = notes.update_note(&note.id, content("two")).await.unwrap();
    sleep(Duration::from_millis(5000)).await;

    let writes = remote.writes_for(&note.id);
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].note.content, "one");
    assert_eq!(writes[1].note.content, "two");
    assert!(writes[1].at.duration_since(writes[0].at) >= Duration::from_millis(1000));
    assert_eq!(engine.watermark(&note.id).await.unwrap(), Some(second.updated_at));
}

#[tokio::test(start_paused = true)]
async fn concurrent_edits_keep_only_one_version() {
    // Expected lossy behavior: edits made on two devices inside one debounce
    // window are not merged.
    let remote = MemoryRemote::new();
    let (device_a, clock_a) = device(0);
    let (device_b, clock_b) = device(0);
    let engine_a = start(&device_a, &remote, SyncConfig::default()).await;
    let engine_b = start(&device_b, &remote, SyncConfig::default()).await;

    let note = device_a.create_note().await.unwrap();
    engine_a.flush().await.unwrap();
    settle().await;

    clock_a.set(30);
    device_a.update_note(&note.id, content("from A")).await.unwrap();
    clock_b.set(40);
    device_b.update_note(&note.id, content("from B")).await.unwrap();

    engine_a.flush().await.unwrap();
    engine_b.flush().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(device_a.get_note(&note.id).await.unwrap().content, "from B");
    assert_eq!(device_b.get_note(&note.id).await.unwrap().content, "from B");
}

#[tokio::test(start_paused = true)]
async fn clock_skew_lets_the_device_ahead_win() {
    // Expected nondeterminism: ordering follows device clocks, not real time.
    let remote = MemoryRemote::new();
    let (device_a, clock_a) = device(0);
    let (device_b, clock_b) = device(0);
    let engine_a = start(&device_a, &remote, SyncConfig::default()).await;
    let engine_b = start(&device_b, &remote, SyncConfig::default()).await;

    let note = device_a.create_note().await.unwrap();
    engine_a.flush().await.unwrap();
    settle().await;

    clock_a.set(1000);
    device_a.update_note(&note.id, content("earlier, fast clock")).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    clock_b.set(50);
    device_b.update_note(&note.id, content("later, slow clock")).await.unwrap();

    engine_b.flush().await.unwrap();
    settle().await;
    engine_a.flush().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    for notes in [&device_a, &device_b] {
        let current = notes.get_note(&note.id).await.unwrap();
        assert_eq!(current.content, "earlier, fast clock");
        assert_eq!(current.updated_at, 1000);
    }
}

#[tokio::test(start_paused = true)]
async fn replace_policy_ignores_empty_snapshots_and_drops_unsynced_notes() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let local = notes.create_note_with(content("local only")).await.unwrap();
    let config = SyncConfig::default().with_snapshot_policy(SnapshotPolicy::Replace);
    let engine = start(&notes, &remote, config).await;
    settle().await;

    assert!(notes.get_note(&local.id).await.is_some());

    let foreign = Note::new(9);
    remote_edit(&remote, &foreign).await;

    let listed = notes.list_notes().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, foreign.id);
    assert!(engine.pending_writes().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_writes_immediately_and_reports_failures() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let first = notes.create_note_with(content("one")).await.unwrap();
    let second = notes.create_note_with(content("two")).await.unwrap();
    engine.flush().await.unwrap();

    assert_eq!(remote.snapshot(&alice()).len(), 2);
    assert!(engine.pending_writes().await.unwrap().is_empty());
    for id in [first.id, second.id] {
        assert_eq!(
            engine.status(&id).await.unwrap(),
            Some(NoteSyncState::Synced)
        );
    }

    remote.set_offline(true);
    notes.update_note(&first.id, content("lost")).await.unwrap();
    let result = engine.flush().await;
    assert!(matches!(result, Err(Error::Remote(_))));
}

#[tokio::test(start_paused = true)]
async fn no_retry_config_gives_up_after_first_failure() {
    let remote = MemoryRemote::new();
    remote.set_offline(true);
    let (notes, _clock) = device(0);
    let config = SyncConfig::default().with_retry(RetryConfig::no_retry());
    let engine = start(&notes, &remote, config).await;

    notes.create_note().await.unwrap();
    sleep(Duration::from_secs(30)).await;

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.writes_failed, 1);
    assert_eq!(stats.retries, 0);
}

#[tokio::test(start_paused = true)]
async fn handle_reports_stopped_engine() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;
    let other = engine.clone();

    let note = notes.create_note().await.unwrap();
    engine.shutdown().await.unwrap();
    settle().await;

    assert!(!other.is_running());
    assert!(matches!(other.stats().await, Err(Error::EngineStopped)));

    sleep(Duration::from_secs(5)).await;
    assert!(remote.writes_for(&note.id).is_empty());
    // Editing keeps working without the engine.
    notes.update_note(&note.id, content("still editable")).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn late_snapshot_scanned_before_our_write_is_ignored() {
    let remote = MemoryRemote::new();
    let lagging = LaggingRemote::new(remote.clone(), Duration::from_millis(5));
    let (notes, clock) = device(10);
    let session = SyncSession::new(alice(), Arc::new(lagging));
    let engine = SyncEngine::start(notes.clone(), session, SyncConfig::default()).await;

    let note = notes.create_note_with(content("v1")).await.unwrap();
    engine.flush().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    assert!(notes.get_note(&note.id).await.is_some());

    clock.set(100);
    notes.update_note(&note.id, content("v2")).await.unwrap();
    engine.flush().await.unwrap();
    sleep(Duration::from_secs(5)).await;

    let contents: Vec<String> = remote
        .writes_for(&note.id)
        .into_iter()
        .map(|record| record.note.content)
        .collect();
    assert_eq!(contents, vec!["v1".to_string(), "v2".to_string()]);
    assert!(engine.conflicts().await.unwrap().is_empty());
    assert_eq!(engine.watermark(&note.id).await.unwrap(), Some(100));
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Synced)
    );
}

#[tokio::test(start_paused = true)]
async fn stale_copy_from_another_device_is_reuploaded_once() {
    let remote = MemoryRemote::new();
    remote.set_latency(Duration::from_millis(100));
    let (notes, clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let note = notes.create_note_with(content("base")).await.unwrap();
    engine.flush().await.unwrap();
    settle().await;

    clock.set(50);
    notes.update_note(&note.id, content("mine")).await.unwrap();
    engine.flush().await.unwrap();
    settle().await;

    // Another device uploads the copy it had before seeing ours.
    let mut stale = notes.get_note(&note.id).await.unwrap();
    stale.content = "stale".to_string();
    stale.updated_at = 20;
    remote_edit(&remote, &stale).await;

    assert_eq!(notes.get_note(&note.id).await.unwrap().content, "mine");
    let conflicts = engine.conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].outcome, ConflictOutcome::KeptLocal);
    assert_eq!(conflicts[0].local_updated_at, 50);
    assert_eq!(conflicts[0].incoming_updated_at, 20);

    sleep(Duration::from_secs(10)).await;
    let writes = remote.writes_for(&note.id);
    let ours = writes
        .iter()
        .filter(|record| record.note.content == "mine")
        .count();
    assert_eq!(ours, 2);
    assert_eq!(writes.len(), 4);
    assert_eq!(remote.snapshot(&alice()).get(&note.id).unwrap().content, "mine");
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Synced)
    );
}

#[tokio::test(start_paused = true)]
async fn delete_during_in_flight_write_removes_the_remote_copy() {
    let remote = MemoryRemote::new();
    remote.set_latency(Duration::from_millis(1000));
    let (notes, _clock) = device(0);
    let config = SyncConfig::default().with_debounce(Duration::from_millis(200));
    let engine = start(&notes, &remote, config).await;

    let note = notes.create_note_with(content("short-lived")).await.unwrap();
    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        engine.status(&note.id).await.unwrap(),
        Some(NoteSyncState::Writing)
    );

    notes.delete_note(&note.id).await.unwrap();
    settle().await;
    // The delete waits for the write to land.
    assert!(remote.deletes().is_empty());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(remote.writes_for(&note.id).len(), 1);
    let deletes = remote.deletes();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].1, note.id);
    assert!(!remote.snapshot(&alice()).contains(&note.id));
    assert!(notes.get_note(&note.id).await.is_none());
    assert_eq!(engine.watermark(&note.id).await.unwrap(), None);
    assert_eq!(engine.stats().await.unwrap().deletes_succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn flush_resends_delete_after_retries_are_exhausted() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let doomed = notes.create_note_with(content("doomed")).await.unwrap();
    engine.flush().await.unwrap();
    settle().await;

    remote.set_offline(true);
    notes.delete_note(&doomed.id).await.unwrap();
    sleep(Duration::from_secs(120)).await;
    assert!(remote.snapshot(&alice()).contains(&doomed.id));
    assert!(matches!(engine.flush().await, Err(Error::Remote(_))));

    remote.set_offline(false);
    engine.flush().await.unwrap();
    assert!(!remote.snapshot(&alice()).contains(&doomed.id));
    assert_eq!(engine.stats().await.unwrap().deletes_succeeded, 1);

    sleep(Duration::from_secs(5)).await;
    assert!(notes.get_note(&doomed.id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn refused_subscription_is_retried() {
    let remote = MemoryRemote::new();
    remote.fail_next_subscribes(1);
    let (notes, _clock) = device(0);
    let engine = start(&notes, &remote, SyncConfig::default()).await;

    let foreign = Note::new(42);
    remote_edit(&remote, &foreign).await;
    assert!(notes.get_note(&foreign.id).await.is_none());
    assert!(engine.stats().await.unwrap().last_error.is_some());

    sleep(Duration::from_millis(600)).await;
    assert_eq!(notes.get_note(&foreign.id).await, Some(foreign));
    assert_eq!(remote.subscriber_count(&alice()), 1);
    assert_eq!(engine.stats().await.unwrap().snapshots_applied, 1);
}

#[tokio::test(start_paused = true)]
async fn closed_snapshot_stream_is_reopened() {
    let remote = MemoryRemote::new();
    let (notes, _clock) = device(0);
    let _engine = start(&notes, &remote, SyncConfig::default()).await;
    settle().await;

    remote.disconnect(&alice());
    settle().await;
    let foreign = Note::new(42);
    remote_edit(&remote, &foreign).await;
    assert!(notes.get_note(&foreign.id).await.is_none());

    sleep(Duration::from_millis(600)).await;
    assert_eq!(notes.get_note(&foreign.id).await, Some(foreign));
    assert_eq!(remote.subscriber_count(&alice()), 1);
}
