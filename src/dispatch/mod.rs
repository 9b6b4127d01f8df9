//! Trigger dispatch.
//!
//! A trigger produces two slow side effects: a notification (network) and a
//! clip (disk). Each has its own bounded queue drained by its own worker
//! thread, so a routine trigger costs the ingestion loop one non-blocking
//! `try_send` per queue.
//!
//! A shutdown flush is the exception: ingestion has already stopped, so its
//! jobs wait for queue space instead of being dropped.
//!
//! Both jobs of one trigger carry the same event id. They may finish in any
//! order. `Dispatcher::finish` closes the queues and waits for the workers, so
//! queued and in-flight jobs complete before shutdown.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::frame::{format_detection_time, Frame, Timestamp};
use crate::pipeline::{TriggerEvent, TriggerReason, TriggerSink};

pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Notification collaborator. Errors are logged by the dispatcher, never retried.
pub trait Notifier: Send {
    fn name(&self) -> &'static str;

    fn notify(&mut self, frames: &[Frame], detected_at: Timestamp) -> Result<()>;
}

/// Persistence collaborator. Returns where the clip was written.
pub trait ClipStore: Send {
    fn persist(&mut self, frames: &[Frame]) -> Result<PathBuf>;
}

struct NotifyJob {
    id: String,
    detected_at: Timestamp,
    frames: Vec<Frame>,
}

struct ArchiveJob {
    id: String,
    frames: Vec<Frame>,
}

#[derive(Debug, Default)]
struct Counters {
    notified: AtomicU64,
    notify_failed: AtomicU64,
    archived: AtomicU64,
    archive_failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub notified: u64,
    pub notify_failed: u64,
    pub archived: u64,
    pub archive_failed: u64,
    /// Jobs discarded because their queue was full or closed.
    pub dropped: u64,
}

pub struct Dispatcher {
    notify_tx: Option<SyncSender<NotifyJob>>,
    archive_tx: Option<SyncSender<ArchiveJob>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Start one notification worker and one archive worker.
    pub fn spawn(
        notifier: Box<dyn Notifier>,
        store: Box<dyn ClipStore>,
        queue_capacity: usize,
    ) -> Result<Self> {
        if queue_capacity == 0 {
            return Err(anyhow!("dispatch queue capacity must be at least 1"));
        }
        let counters = Arc::new(Counters::default());

        let (notify_tx, notify_rx) = mpsc::sync_channel(queue_capacity);
        let (archive_tx, archive_rx) = mpsc::sync_channel(queue_capacity);

        let notify_counters = counters.clone();
        let notify_worker = std::thread::Builder::new()
            .name("notify-worker".into())
            .spawn(move || run_notifier(notifier, notify_rx, notify_counters))?;

        let archive_counters = counters.clone();
        let archive_worker = std::thread::Builder::new()
            .name("archive-worker".into())
            .spawn(move || run_archiver(store, archive_rx, archive_counters))?;

        Ok(Self {
            notify_tx: Some(notify_tx),
            archive_tx: Some(archive_tx),
            workers: vec![notify_worker, archive_worker],
            counters,
        })
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            notified: c.notified.load(Ordering::SeqCst),
            notify_failed: c.notify_failed.load(Ordering::SeqCst),
            archived: c.archived.load(Ordering::SeqCst),
            archive_failed: c.archive_failed.load(Ordering::SeqCst),
            dropped: c.dropped.load(Ordering::SeqCst),
        }
    }

    /// Stop accepting jobs and wait for the workers to drain their queues.
    pub fn finish(mut self) -> Result<DispatchStats> {
        self.close()?;
        Ok(self.stats())
    }

    fn close(&mut self) -> Result<()> {
        self.notify_tx.take();
        self.archive_tx.take();
        let mut panicked = false;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                panicked = true;
            }
        }
        if panicked {
            return Err(anyhow!("dispatch worker thread panicked"));
        }
        Ok(())
    }

    /// Queue one job. Non-blocking unless `blocking`, which waits for space.
    fn enqueue<T>(
        &self,
        tx: Option<&SyncSender<T>>,
        job: T,
        blocking: bool,
        kind: &str,
        id: &str,
    ) {
        let Some(tx) = tx else {
            log::error!("{} job for trigger {} dropped: dispatcher closed", kind, id);
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            return;
        };
        let sent = if blocking {
            tx.send(job).map_err(|e| TrySendError::Disconnected(e.0))
        } else {
            tx.try_send(job)
        };
        match sent {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::error!("{} queue full; trigger {} job dropped", kind, id);
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("{} worker gone; trigger {} job dropped", kind, id);
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl TriggerSink for Dispatcher {
    fn dispatch(&mut self, event: TriggerEvent) {
        let TriggerEvent {
            id,
            reason,
            detected_at,
            sample,
            clip,
        } = event;
        let blocking = reason == TriggerReason::Shutdown;
        self.enqueue(
            self.notify_tx.as_ref(),
            NotifyJob {
                id: id.clone(),
                detected_at,
                frames: sample,
            },
            blocking,
            "notify",
            &id,
        );
        self.enqueue(
            self.archive_tx.as_ref(),
            ArchiveJob {
                id: id.clone(),
                frames: clip,
            },
            blocking,
            "archive",
            &id,
        );
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("dispatcher shutdown: {}", e);
        }
    }
}

fn run_notifier(mut notifier: Box<dyn Notifier>, rx: Receiver<NotifyJob>, counters: Arc<Counters>) {
    for job in rx {
        match notifier.notify(&job.frames, job.detected_at) {
            Ok(()) => {
                counters.notified.fetch_add(1, Ordering::SeqCst);
                log::info!(
                    "trigger {}: {} notification sent for detection at {}",
                    job.id,
                    notifier.name(),
                    format_detection_time(job.detected_at)
                );
            }
            Err(e) => {
                counters.notify_failed.fetch_add(1, Ordering::SeqCst);
                log::error!("trigger {}: {} notification failed: {:#}", job.id, notifier.name(), e);
            }
        }
    }
}

fn run_archiver(mut store: Box<dyn ClipStore>, rx: Receiver<ArchiveJob>, counters: Arc<Counters>) {
    for job in rx {
        match store.persist(&job.frames) {
            Ok(path) => {
                counters.archived.fetch_add(1, Ordering::SeqCst);
                log::info!("trigger {}: clip saved to {}", job.id, path.display());
            }
            Err(e) => {
                counters.archive_failed.fetch_add(1, Ordering::SeqCst);
                log::error!("trigger {}: clip save failed: {:#}", job.id, e);
            }
        }
    }
}
