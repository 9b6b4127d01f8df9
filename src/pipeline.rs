//! Detection pipeline: the per-frame state machine.
//!
//! Each ingested frame is one tick:
//!
//! 1. Motion gate.
//! 2. Motion and cooldown expired: ask the recognition oracle.
//!    - no face: nothing changes
//!    - known: cooldown restarts, evidence is discarded, back to idle
//!    - unknown: frame becomes evidence, recording (re)starts its idle clock
//! 3. Otherwise, while recording, count an idle tick.
//! 4. Every tick: fire the trigger once the recording has been idle long enough.
//!
//! On shutdown a non-empty recording is flushed through the trigger exactly once.
//! State is owned by the pipeline and mutated only from `tick`/`shutdown`; the
//! trigger payload is a detached copy handed to a `TriggerSink`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::time::{Duration, UNIX_EPOCH};

use crate::cooldown::{CooldownTracker, DEFAULT_COOLDOWN};
use crate::evidence::EvidenceAccumulator;
use crate::frame::{Frame, Timestamp};
use crate::motion::MotionDetector;
use crate::recognize::{RecognitionOracle, RecognitionResult};

/// Idle ticks that had to be exceeded before a recording was flushed.
pub const RECORDING_DURATION_THRESHOLD: u64 = 120;

/// Wall-clock equivalent of `RECORDING_DURATION_THRESHOLD` at 10 fps.
pub const DEFAULT_RECORDING_IDLE: Duration = Duration::from_secs(12);

pub const DEFAULT_SAMPLE_FRAMES: usize = 5;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// When an idle recording is flushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Fire once more than this much capture time has passed since the last
    /// unknown classification.
    WallClock(Duration),
    /// Fire once the idle tick counter exceeds this value.
    IdleTicks(u64),
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::WallClock(DEFAULT_RECORDING_IDLE)
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub cooldown: Duration,
    pub trigger: TriggerPolicy,
    /// Frames attached to the notification.
    pub sample_frames: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            trigger: TriggerPolicy::default(),
            sample_frames: DEFAULT_SAMPLE_FRAMES,
        }
    }
}

// ----------------------------------------------------------------------------
// State
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Accumulating,
}

/// Mutable core state.
///
/// Invariants: `Idle` implies an empty evidence buffer; `Accumulating` implies
/// at least one buffered frame; every unknown classification zeroes `idle_ticks`.
#[derive(Debug)]
pub struct PipelineState {
    cooldown: CooldownTracker,
    last_unknown_at: Option<Timestamp>,
    recording: RecordingState,
    idle_ticks: u64,
    evidence: EvidenceAccumulator,
}

impl PipelineState {
    fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: CooldownTracker::new(cooldown),
            last_unknown_at: None,
            recording: RecordingState::Idle,
            idle_ticks: 0,
            evidence: EvidenceAccumulator::new(),
        }
    }

    pub fn last_known_at(&self) -> Option<Timestamp> {
        self.cooldown.last_known_at()
    }

    pub fn last_unknown_at(&self) -> Option<Timestamp> {
        self.last_unknown_at
    }

    pub fn recording(&self) -> RecordingState {
        self.recording
    }

    pub fn is_recording(&self) -> bool {
        self.recording == RecordingState::Accumulating
    }

    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }

    pub fn evidence_len(&self) -> usize {
        self.evidence.len()
    }

    pub fn evidence_bytes(&self) -> usize {
        self.evidence.memory_bytes()
    }

    fn reset_recording(&mut self) {
        self.evidence.clear();
        self.recording = RecordingState::Idle;
        self.idle_ticks = 0;
        self.last_unknown_at = None;
    }
}

// ----------------------------------------------------------------------------
// Trigger payload
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerReason {
    /// The recording stayed idle past the trigger policy.
    IdleTimeout,
    /// Flushed because the process is shutting down.
    Shutdown,
}

/// One firing: a consistent snapshot of the recording at fire time.
#[derive(Clone, Debug)]
pub struct TriggerEvent {
    /// Short hex id linking the notification and the clip in logs.
    pub id: String,
    pub reason: TriggerReason,
    /// Time of the last unknown classification.
    pub detected_at: Timestamp,
    /// Random subset of the evidence for the notification.
    pub sample: Vec<Frame>,
    /// Every buffered frame, in capture order, for the clip.
    pub clip: Vec<Frame>,
}

/// Receives trigger events. Must not block the caller for long.
pub trait TriggerSink {
    fn dispatch(&mut self, event: TriggerEvent);
}

impl TriggerSink for Vec<TriggerEvent> {
    fn dispatch(&mut self, event: TriggerEvent) {
        self.push(event);
    }
}

// ----------------------------------------------------------------------------
// Pipeline
// ----------------------------------------------------------------------------

/// What happened during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub motion: bool,
    /// `None` when recognition was skipped.
    pub recognition: Option<RecognitionResult>,
    pub triggered: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub motion_ticks: u64,
    pub recognitions: u64,
    pub known: u64,
    pub unknown: u64,
    pub triggers: u64,
}

pub struct DetectionPipeline<M, O, S, R = StdRng> {
    motion: M,
    oracle: O,
    sink: S,
    rng: R,
    config: PipelineConfig,
    state: PipelineState,
    stats: PipelineStats,
}

impl<M, O, S> DetectionPipeline<M, O, S, StdRng>
where
    M: MotionDetector,
    O: RecognitionOracle,
    S: TriggerSink,
{
    pub fn new(motion: M, oracle: O, sink: S, config: PipelineConfig) -> Self {
        Self::with_rng(motion, oracle, sink, config, StdRng::from_entropy())
    }
}

impl<M, O, S, R> DetectionPipeline<M, O, S, R>
where
    M: MotionDetector,
    O: RecognitionOracle,
    S: TriggerSink,
    R: Rng,
{
    /// Build with an explicit randomness source for evidence sampling.
    pub fn with_rng(motion: M, oracle: O, sink: S, config: PipelineConfig, rng: R) -> Self {
        let state = PipelineState::new(config.cooldown);
        Self {
            motion,
            oracle,
            sink,
            rng,
            config,
            state,
            stats: PipelineStats::default(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Process one frame. Time is taken from the frame's capture timestamp.
    pub fn tick(&mut self, frame: &Frame) -> TickOutcome {
        let now = frame.captured_at();
        self.stats.ticks += 1;

        let motion = self.motion.detect(frame);
        if motion {
            self.stats.motion_ticks += 1;
        }

        let mut recognition = None;
        if motion && self.state.cooldown.is_expired(now) {
            let result = self.oracle.recognize(frame);
            self.stats.recognitions += 1;
            recognition = Some(result);
            self.apply(result, frame, now);
        } else if self.state.is_recording() {
            self.state.idle_ticks += 1;
        }

        let triggered = if self.trigger_due(now) {
            self.fire(TriggerReason::IdleTimeout, now);
            true
        } else {
            false
        };

        TickOutcome {
            motion,
            recognition,
            triggered,
        }
    }

    /// Flush a non-empty recording before exit. Returns true if a trigger fired.
    pub fn shutdown(&mut self, now: Timestamp) -> bool {
        if self.state.is_recording() && !self.state.evidence.is_empty() {
            self.fire(TriggerReason::Shutdown, now);
            true
        } else {
            false
        }
    }

    fn apply(&mut self, result: RecognitionResult, frame: &Frame, now: Timestamp) {
        match result {
            RecognitionResult::NoFace => {}
            RecognitionResult::Known => {
                self.stats.known += 1;
                if self.state.is_recording() {
                    log::info!(
                        "known face confirmed; discarding {} evidence frame(s)",
                        self.state.evidence.len()
                    );
                } else {
                    log::debug!("known face confirmed");
                }
                self.state.cooldown.record_known(now);
                self.state.reset_recording();
            }
            RecognitionResult::Unknown => {
                self.stats.unknown += 1;
                if !self.state.is_recording() {
                    log::info!("unknown face detected; recording evidence");
                }
                self.state.last_unknown_at = Some(now);
                self.state.evidence.record(frame);
                self.state.recording = RecordingState::Accumulating;
                self.state.idle_ticks = 0;
            }
        }
    }

    fn trigger_due(&self, now: Timestamp) -> bool {
        if !self.state.is_recording() || self.state.evidence.is_empty() {
            return false;
        }
        match self.config.trigger {
            TriggerPolicy::IdleTicks(threshold) => self.state.idle_ticks > threshold,
            TriggerPolicy::WallClock(idle) => self
                .state
                .last_unknown_at
                .and_then(|last| now.duration_since(last).ok())
                .is_some_and(|elapsed| elapsed > idle),
        }
    }

    fn fire(&mut self, reason: TriggerReason, now: Timestamp) {
        let detected_at = self.state.last_unknown_at.unwrap_or(now);
        let sample = self
            .state
            .evidence
            .sample(self.config.sample_frames, &mut self.rng);
        let clip = self.state.evidence.drain();
        self.state.reset_recording();
        self.stats.triggers += 1;

        let event = TriggerEvent {
            id: event_id(detected_at, clip.len(), reason),
            reason,
            detected_at,
            sample,
            clip,
        };
        log::info!(
            "trigger {} fired ({:?}): {} clip frame(s), {} sampled",
            event.id,
            reason,
            event.clip.len(),
            event.sample.len()
        );
        self.sink.dispatch(event);
    }
}

fn event_id(detected_at: Timestamp, clip_len: usize, reason: TriggerReason) -> String {
    let nanos = detected_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update((clip_len as u64).to_le_bytes());
    hasher.update([reason as u8]);
    let digest: [u8; 32] = hasher.finalize().into();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::SystemTime;

    struct Script(VecDeque<bool>);

    impl MotionDetector for Script {
        fn detect(&mut self, _frame: &Frame) -> bool {
            self.0.pop_front().unwrap_or(false)
        }
    }

    struct Answers(VecDeque<RecognitionResult>);

    impl RecognitionOracle for Answers {
        fn recognize(&mut self, _frame: &Frame) -> RecognitionResult {
            self.0.pop_front().unwrap_or(RecognitionResult::NoFace)
        }
    }

    fn frame_at(secs: u64) -> Frame {
        Frame::solid(2, 2, [secs as u8, 0, 0], SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap()
    }

    fn pipeline(
        motion: &[bool],
        answers: &[RecognitionResult],
        trigger: TriggerPolicy,
    ) -> DetectionPipeline<Script, Answers, Vec<TriggerEvent>> {
        DetectionPipeline::with_rng(
            Script(motion.iter().copied().collect()),
            Answers(answers.iter().copied().collect()),
            Vec::new(),
            PipelineConfig {
                trigger,
                ..PipelineConfig::default()
            },
            StdRng::seed_from_u64(3),
        )
    }

    #[test]
    fn no_face_leaves_state_untouched() {
        let mut p = pipeline(&[true], &[RecognitionResult::NoFace], TriggerPolicy::IdleTicks(1));
        let outcome = p.tick(&frame_at(1));
        assert_eq!(outcome.recognition, Some(RecognitionResult::NoFace));
        assert!(!p.state().is_recording());
        assert_eq!(p.state().idle_ticks(), 0);
    }

    #[test]
    fn idle_ticks_count_only_while_recording() {
        let mut p = pipeline(
            &[false, true, false, false],
            &[RecognitionResult::Unknown],
            TriggerPolicy::IdleTicks(10),
        );
        p.tick(&frame_at(1));
        assert_eq!(p.state().idle_ticks(), 0);
        p.tick(&frame_at(2));
        p.tick(&frame_at(3));
        p.tick(&frame_at(4));
        assert_eq!(p.state().idle_ticks(), 2);
        assert_eq!(p.state().evidence_len(), 1);
    }

    #[test]
    fn wall_clock_policy_fires_after_idle_duration() {
        let mut p = pipeline(
            &[true],
            &[RecognitionResult::Unknown],
            TriggerPolicy::WallClock(Duration::from_secs(12)),
        );
        p.tick(&frame_at(100));
        assert!(!p.tick(&frame_at(112)).triggered);
        assert!(p.tick(&frame_at(113)).triggered);

        let events = p.into_sink();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, TriggerReason::IdleTimeout);
        assert_eq!(events[0].detected_at, frame_at(100).captured_at());
        assert_eq!(events[0].clip, vec![frame_at(100)]);
    }

    #[test]
    fn trigger_resets_all_recording_state() {
        let mut p = pipeline(&[true], &[RecognitionResult::Unknown], TriggerPolicy::IdleTicks(0));
        p.tick(&frame_at(1));
        assert!(p.tick(&frame_at(2)).triggered);
        let state = p.state();
        assert!(!state.is_recording());
        assert_eq!(state.evidence_len(), 0);
        assert_eq!(state.idle_ticks(), 0);
        assert_eq!(state.last_unknown_at(), None);
        assert_eq!(p.stats().triggers, 1);
    }

    #[test]
    fn event_ids_differ_per_detection() {
        let a = event_id(frame_at(1).captured_at(), 1, TriggerReason::IdleTimeout);
        let b = event_id(frame_at(2).captured_at(), 1, TriggerReason::IdleTimeout);
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
