use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use presence_watch::archive::MANIFEST_FILE;
use presence_watch::{
    ClipStore, DetectionPipeline, Dispatcher, Frame, FrameDirClipStore, MotionDetector, Notifier,
    OutboxNotifier, PipelineConfig, RecognitionOracle, RecognitionResult, Timestamp, TriggerEvent,
    TriggerPolicy, TriggerReason, TriggerSink,
};

fn frame(n: u64) -> Frame {
    Frame::solid(
        8,
        8,
        [n as u8, 40, 90],
        SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_000 + n * 100),
    )
    .unwrap()
}

fn event(id: &str, clip: Vec<Frame>) -> TriggerEvent {
    let detected_at = clip
        .last()
        .map(Frame::captured_at)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    TriggerEvent {
        id: id.to_string(),
        reason: TriggerReason::IdleTimeout,
        detected_at,
        sample: clip.clone(),
        clip,
    }
}

// ----------------------------------------------------------------------------
// Test collaborators
// ----------------------------------------------------------------------------

/// Blocks every call until the test releases it.
struct Gate {
    started: Sender<()>,
    release: Receiver<()>,
}

impl Gate {
    fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        (
            Self {
                started: started_tx,
                release: release_rx,
            },
            started_rx,
            release_tx,
        )
    }

    fn pass(&self) {
        let _ = self.started.send(());
        let _ = self.release.recv();
    }
}

struct GatedNotifier(Gate);

impl Notifier for GatedNotifier {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn notify(&mut self, _frames: &[Frame], _detected_at: Timestamp) -> Result<()> {
        self.0.pass();
        Ok(())
    }
}

struct GatedStore(Gate);

impl ClipStore for GatedStore {
    fn persist(&mut self, _frames: &[Frame]) -> Result<PathBuf> {
        self.0.pass();
        Ok(PathBuf::from("gated"))
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    seen: Arc<Mutex<Vec<(usize, Timestamp)>>>,
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn notify(&mut self, frames: &[Frame], detected_at: Timestamp) -> Result<()> {
        self.seen.lock().unwrap().push((frames.len(), detected_at));
        Ok(())
    }
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn notify(&mut self, _frames: &[Frame], _detected_at: Timestamp) -> Result<()> {
        Err(anyhow!("smtp unreachable"))
    }
}

struct Always(bool);

impl MotionDetector for Always {
    fn detect(&mut self, _frame: &Frame) -> bool {
        self.0
    }
}

struct FirstUnknown(bool);

impl RecognitionOracle for FirstUnknown {
    fn recognize(&mut self, _frame: &Frame) -> RecognitionResult {
        if std::mem::replace(&mut self.0, false) {
            RecognitionResult::Unknown
        } else {
            RecognitionResult::NoFace
        }
    }
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

#[test]
fn dispatch_does_not_wait_for_slow_workers() {
    let (notify_gate, notify_started, notify_release) = Gate::new();
    let (store_gate, store_started, store_release) = Gate::new();
    let mut dispatcher = Dispatcher::spawn(
        Box::new(GatedNotifier(notify_gate)),
        Box::new(GatedStore(store_gate)),
        4,
    )
    .unwrap();

    let begun = Instant::now();
    dispatcher.dispatch(event("a", vec![frame(1)]));
    dispatcher.dispatch(event("b", vec![frame(2)]));
    assert!(begun.elapsed() < Duration::from_secs(1));

    // Both workers are now stuck inside their first job.
    notify_started.recv_timeout(Duration::from_secs(5)).unwrap();
    store_started.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(dispatcher.stats().notified, 0);
    assert_eq!(dispatcher.stats().archived, 0);

    for _ in 0..2 {
        notify_release.send(()).unwrap();
        store_release.send(()).unwrap();
    }
    let stats = dispatcher.finish().unwrap();
    assert_eq!(stats.notified, 2);
    assert_eq!(stats.archived, 2);
    assert_eq!(stats.dropped, 0);
}

#[test]
fn full_queue_drops_jobs_and_counts_them() {
    let (notify_gate, notify_started, notify_release) = Gate::new();
    let (store_gate, store_started, store_release) = Gate::new();
    let mut dispatcher = Dispatcher::spawn(
        Box::new(GatedNotifier(notify_gate)),
        Box::new(GatedStore(store_gate)),
        1,
    )
    .unwrap();

    dispatcher.dispatch(event("first", vec![frame(1)]));
    notify_started.recv_timeout(Duration::from_secs(5)).unwrap();
    store_started.recv_timeout(Duration::from_secs(5)).unwrap();

    // One job per queue fits behind the busy worker; the next is dropped.
    dispatcher.dispatch(event("second", vec![frame(2)]));
    dispatcher.dispatch(event("third", vec![frame(3)]));
    assert_eq!(dispatcher.stats().dropped, 2);

    drop(notify_release);
    drop(store_release);
    let stats = dispatcher.finish().unwrap();
    assert_eq!(stats.notified, 2);
    assert_eq!(stats.archived, 2);
    assert_eq!(stats.dropped, 2);
}

#[test]
fn shutdown_flush_waits_for_queue_space() {
    let (notify_gate, notify_started, notify_release) = Gate::new();
    let (store_gate, store_started, store_release) = Gate::new();
    let dispatcher = Dispatcher::spawn(
        Box::new(GatedNotifier(notify_gate)),
        Box::new(GatedStore(store_gate)),
        1,
    )
    .unwrap();
    let mut pipeline = DetectionPipeline::with_rng(
        Always(true),
        FirstUnknown(true),
        dispatcher,
        PipelineConfig {
            trigger: TriggerPolicy::IdleTicks(1_000),
            ..PipelineConfig::default()
        },
        StdRng::seed_from_u64(4),
    );

    // Workers busy with "a", queues full with "b".
    pipeline.sink_mut().dispatch(event("a", vec![frame(1)]));
    notify_started.recv_timeout(Duration::from_secs(5)).unwrap();
    store_started.recv_timeout(Duration::from_secs(5)).unwrap();
    pipeline.sink_mut().dispatch(event("b", vec![frame(2)]));

    pipeline.tick(&frame(3));
    assert!(pipeline.state().is_recording());

    let releaser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        for _ in 0..3 {
            notify_release.send(()).unwrap();
            store_release.send(()).unwrap();
        }
    });
    assert!(pipeline.shutdown(SystemTime::now()));
    releaser.join().unwrap();

    let stats = pipeline.into_sink().finish().unwrap();
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.notified, 3);
    assert_eq!(stats.archived, 3);
}

#[test]
fn collaborator_failures_are_counted_not_retried() {
    let root = tempfile::tempdir().unwrap();
    let store = FrameDirClipStore::new(root.path(), 10).unwrap();
    let mut dispatcher = Dispatcher::spawn(Box::new(FailingNotifier), Box::new(store), 4).unwrap();

    dispatcher.dispatch(event("ok-clip", vec![frame(1), frame(2)]));
    dispatcher.dispatch(event("empty-clip", Vec::new()));

    let stats = dispatcher.finish().unwrap();
    assert_eq!(stats.notify_failed, 2);
    assert_eq!(stats.notified, 0);
    assert_eq!(stats.archived, 1);
    assert_eq!(stats.archive_failed, 1);
}

#[test]
fn dropping_dispatcher_drains_queued_jobs() {
    let notifier = RecordingNotifier::default();
    let seen = notifier.seen.clone();
    let root = tempfile::tempdir().unwrap();
    {
        let store = FrameDirClipStore::new(root.path(), 10).unwrap();
        let mut dispatcher = Dispatcher::spawn(Box::new(notifier), Box::new(store), 4).unwrap();
        dispatcher.dispatch(event("x", vec![frame(5), frame(6), frame(7)]));
    }
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (3, frame(7).captured_at()));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
}

#[test]
fn zero_capacity_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let store = FrameDirClipStore::new(root.path(), 10).unwrap();
    assert!(Dispatcher::spawn(Box::new(FailingNotifier), Box::new(store), 0).is_err());
}

// ----------------------------------------------------------------------------
// Pipeline -> dispatcher -> outbox + archive
// ----------------------------------------------------------------------------

#[test]
fn shutdown_flush_reaches_outbox_and_archive() {
    let outbox = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    let dispatcher = Dispatcher::spawn(
        Box::new(OutboxNotifier::new(outbox.path()).unwrap()),
        Box::new(FrameDirClipStore::new(archive.path(), 10).unwrap()),
        2,
    )
    .unwrap();
    let mut pipeline = DetectionPipeline::with_rng(
        Always(true),
        FirstUnknown(true),
        dispatcher,
        PipelineConfig {
            trigger: TriggerPolicy::IdleTicks(1_000),
            ..PipelineConfig::default()
        },
        StdRng::seed_from_u64(9),
    );

    pipeline.tick(&frame(1));
    pipeline.tick(&frame(2));
    assert!(pipeline.state().is_recording());
    assert!(pipeline.shutdown(SystemTime::now()));

    let stats = pipeline.into_sink().finish().unwrap();
    assert_eq!(stats.notified, 1);
    assert_eq!(stats.archived, 1);

    let notes: Vec<PathBuf> = std::fs::read_dir(outbox.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].join("message.json").exists());
    assert!(notes[0].join("attachment_1.jpg").exists());

    let clips: Vec<PathBuf> = std::fs::read_dir(archive.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(clips.len(), 1);
    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(clips[0].join(MANIFEST_FILE)).unwrap()).unwrap();
    assert_eq!(manifest["frame_count"], 1);
}
