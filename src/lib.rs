//! Presence Watch
//!
//! Motion-gated face watch for a single video stream. Frames flow through a
//! cheap motion gate; moving frames are checked against a set of known faces
//! (at most once per cooldown window after a known face is confirmed). While an
//! unknown face is present its frames are kept as evidence; once the scene has
//! been quiet long enough the evidence is handed off for notification and
//! archival on worker threads, without stalling ingestion.
//!
//! # Module Structure
//!
//! - `frame`: owned RGB frames and capture timestamps
//! - `ingest`: frame sources (synthetic scene, image-sequence replay)
//! - `motion`: motion gate
//! - `recognize`: face encoders, reference set, recognizer
//! - `cooldown`, `evidence`: pipeline building blocks
//! - `pipeline`: the per-frame state machine
//! - `dispatch`: queues and workers for trigger side effects
//! - `notify`, `archive`: notification and clip collaborators
//! - `config`: daemon configuration
//! - `storage`: atomic writes, JPEG encoding, digests

pub mod archive;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod evidence;
pub mod frame;
pub mod ingest;
pub mod motion;
pub mod notify;
pub mod pipeline;
pub mod recognize;
pub mod storage;

pub use archive::FrameDirClipStore;
pub use config::WatchdConfig;
pub use cooldown::CooldownTracker;
pub use dispatch::{ClipStore, DispatchStats, Dispatcher, Notifier};
pub use evidence::EvidenceAccumulator;
pub use frame::{format_detection_time, Frame, Timestamp};
pub use ingest::{open_source, FrameSource, ImageDirSource, SyntheticSource};
pub use motion::{MotionConfig, MotionDetector, MotionGate};
pub use notify::{build_notifier, LogNotifier, OutboxNotifier};
pub use pipeline::{
    DetectionPipeline, PipelineConfig, PipelineState, PipelineStats, RecordingState, TickOutcome,
    TriggerEvent, TriggerPolicy, TriggerReason, TriggerSink, RECORDING_DURATION_THRESHOLD,
};
pub use recognize::{
    build_encoder, FaceEncoder, FeatureVector, RecognitionOracle, RecognitionResult, Recognizer,
    ReferenceSet,
};
