//! watchd - Presence Watch daemon
//!
//! This daemon:
//! 1. Opens the configured frame source (fatal if unavailable)
//! 2. Loads the known-face reference set
//! 3. Runs every frame through the detection pipeline
//! 4. Hands triggers to notification/archive workers without blocking capture
//! 5. On Ctrl-C / SIGTERM / end of stream, flushes any open recording and
//!    waits for in-flight handoffs before exiting

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use presence_watch::{
    build_encoder, build_notifier, open_source, DetectionPipeline, Dispatcher, FrameDirClipStore,
    MotionGate, Recognizer, ReferenceSet, WatchdConfig,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Motion-gated known/unknown face watch")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "WATCHD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the frame source (stub://<name> or a directory of stills).
    #[arg(long)]
    source: Option<String>,

    /// Stop after this many frames (flushes like a shutdown).
    #[arg(long)]
    max_frames: Option<u64>,

    /// Process frames as fast as they arrive instead of holding target fps.
    #[arg(long)]
    no_pace: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = WatchdConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if args.no_pace {
        cfg.source.pace = false;
    }

    log::info!("starting camera, motion detection, and face recognition...");
    let mut source = open_source(&cfg.source)?;
    source.connect().context("video source not found")?;

    let mut encoder = build_encoder(&cfg.recognition)?;
    let references = ReferenceSet::load_dir(&cfg.reference_dir, encoder.as_mut())?;
    if references.is_empty() {
        log::warn!("no known faces loaded; every face will be treated as unknown");
    }
    let recognizer = Recognizer::new(encoder, references, cfg.recognition.tolerance)?;
    log::info!(
        "recognizer ready: encoder={} references={} tolerance={}",
        recognizer.encoder_name(),
        recognizer.references().len(),
        cfg.recognition.tolerance
    );
    let gate = MotionGate::new(cfg.motion)?;

    let notifier = build_notifier(&cfg.notify)?;
    let store = FrameDirClipStore::new(&cfg.archive.dir, cfg.archive.fps)?;
    let dispatcher = Dispatcher::spawn(notifier, Box::new(store), cfg.dispatch.queue_capacity)?;

    let mut pipeline = DetectionPipeline::new(gate, recognizer, dispatcher, cfg.pipeline_config());

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    log::info!(
        "watchd running. source={} trigger={:?} cooldown={}s archive={}",
        cfg.source.url,
        cfg.trigger,
        cfg.recognition.cooldown.as_secs(),
        cfg.archive.dir.display()
    );

    let frame_interval = Duration::from_secs(1) / cfg.source.target_fps;
    let mut last_health_log = Instant::now();
    let mut capture_error = None;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("shutdown signal received");
            break;
        }
        if args.max_frames.is_some_and(|max| pipeline.stats().ticks >= max) {
            log::info!("frame limit reached");
            break;
        }

        let started = Instant::now();
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("end of stream");
                break;
            }
            Err(e) => {
                capture_error = Some(e);
                break;
            }
        };

        let outcome = pipeline.tick(&frame);
        log::debug!(
            "tick motion={} recognition={:?} recording={:?} idle_ticks={}",
            outcome.motion,
            outcome.recognition,
            pipeline.state().recording(),
            pipeline.state().idle_ticks()
        );

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = pipeline.stats();
            let source_stats = source.stats();
            log::info!(
                "health={} frames={} motion={} recognitions={} triggers={} recording={:?} evidence={} (~{} KB) url={}",
                source.is_healthy(),
                source_stats.frames_captured,
                stats.motion_ticks,
                stats.recognitions,
                stats.triggers,
                pipeline.state().recording(),
                pipeline.state().evidence_len(),
                pipeline.state().evidence_bytes() / 1024,
                source_stats.url
            );
            last_health_log = Instant::now();
        }

        if cfg.source.pace {
            if let Some(rest) = frame_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    if capture_error.is_none() && pipeline.shutdown(SystemTime::now()) {
        log::info!("flushed open recording before exit");
    }

    let stats = pipeline.stats();
    let dispatch_stats = pipeline.into_sink().finish()?;
    log::info!(
        "watchd stopped: frames={} recognitions={} known={} unknown={} triggers={} notified={} archived={} failed={} dropped={}",
        stats.ticks,
        stats.recognitions,
        stats.known,
        stats.unknown,
        stats.triggers,
        dispatch_stats.notified,
        dispatch_stats.archived,
        dispatch_stats.notify_failed + dispatch_stats.archive_failed,
        dispatch_stats.dropped
    );

    match capture_error {
        Some(e) => Err(e.context("error while reading frame")),
        None => Ok(()),
    }
}
