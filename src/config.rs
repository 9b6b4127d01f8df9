use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::{DEFAULT_ARCHIVE_DIR, DEFAULT_CLIP_FPS};
use crate::cooldown::DEFAULT_COOLDOWN;
use crate::dispatch::DEFAULT_QUEUE_CAPACITY;
use crate::motion::{MotionConfig, DEFAULT_BLUR_KERNEL, DEFAULT_MOTION_THRESHOLD};
use crate::pipeline::{
    PipelineConfig, TriggerPolicy, DEFAULT_RECORDING_IDLE, DEFAULT_SAMPLE_FRAMES,
};
use crate::recognize::DEFAULT_TOLERANCE;

const DEFAULT_SOURCE_URL: &str = "stub://front_door";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_REFERENCE_DIR: &str = "data/known_faces";
const DEFAULT_ENCODER: &str = "cpu";
const DEFAULT_MODEL_INPUT: u32 = 112;
const DEFAULT_NOTIFIER: &str = "log";
const DEFAULT_OUTBOX_DIR: &str = "data/outbox";

#[derive(Debug, Deserialize, Default)]
struct WatchdConfigFile {
    source: Option<SourceConfigFile>,
    reference_dir: Option<PathBuf>,
    recognition: Option<RecognitionConfigFile>,
    motion: Option<MotionConfigFile>,
    recording: Option<RecordingConfigFile>,
    dispatch: Option<DispatchConfigFile>,
    notify: Option<NotifyConfigFile>,
    archive: Option<ArchiveConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    pace: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RecognitionConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    model_input_width: Option<u32>,
    model_input_height: Option<u32>,
    tolerance: Option<f32>,
    cooldown_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    threshold: Option<u8>,
    blur_kernel: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    idle_secs: Option<u64>,
    idle_ticks: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DispatchConfigFile {
    sample_frames: Option<usize>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifyConfigFile {
    kind: Option<String>,
    outbox_dir: Option<PathBuf>,
    webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ArchiveConfigFile {
    dir: Option<PathBuf>,
    fps: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct WatchdConfig {
    pub source: SourceSettings,
    pub reference_dir: PathBuf,
    pub recognition: RecognitionSettings,
    pub motion: MotionConfig,
    pub trigger: TriggerPolicy,
    pub dispatch: DispatchSettings,
    pub notify: NotifySettings,
    pub archive: ArchiveSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Sleep between ticks to hold `target_fps` (replays and synthetic scenes).
    pub pace: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            target_fps: DEFAULT_SOURCE_FPS,
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
            pace: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub model_input_width: u32,
    pub model_input_height: u32,
    pub tolerance: f32,
    pub cooldown: Duration,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_ENCODER.to_string(),
            model_path: None,
            model_input_width: DEFAULT_MODEL_INPUT,
            model_input_height: DEFAULT_MODEL_INPUT,
            tolerance: DEFAULT_TOLERANCE,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub sample_frames: usize,
    pub queue_capacity: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            sample_frames: DEFAULT_SAMPLE_FRAMES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub kind: String,
    pub outbox_dir: PathBuf,
    pub webhook_url: Option<String>,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            kind: DEFAULT_NOTIFIER.to_string(),
            outbox_dir: PathBuf::from(DEFAULT_OUTBOX_DIR),
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub dir: PathBuf,
    pub fps: u32,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            fps: DEFAULT_CLIP_FPS,
        }
    }
}

impl WatchdConfig {
    /// Load from the file named by `WATCHD_CONFIG` (if any), then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WATCHD_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (JSON, or TOML for `.toml`), then env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            cooldown: self.recognition.cooldown,
            trigger: self.trigger,
            sample_frames: self.dispatch.sample_frames,
        }
    }

    fn from_file(file: WatchdConfigFile) -> Self {
        let source_defaults = SourceSettings::default();
        let source = file.source.unwrap_or_default();
        let source = SourceSettings {
            url: source.url.unwrap_or(source_defaults.url),
            target_fps: source.target_fps.unwrap_or(source_defaults.target_fps),
            width: source.width.unwrap_or(source_defaults.width),
            height: source.height.unwrap_or(source_defaults.height),
            pace: source.pace.unwrap_or(source_defaults.pace),
        };

        let recognition_defaults = RecognitionSettings::default();
        let recognition = file.recognition.unwrap_or_default();
        let recognition = RecognitionSettings {
            backend: recognition.backend.unwrap_or(recognition_defaults.backend),
            model_path: recognition.model_path,
            model_input_width: recognition
                .model_input_width
                .unwrap_or(recognition_defaults.model_input_width),
            model_input_height: recognition
                .model_input_height
                .unwrap_or(recognition_defaults.model_input_height),
            tolerance: recognition.tolerance.unwrap_or(recognition_defaults.tolerance),
            cooldown: recognition
                .cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(recognition_defaults.cooldown),
        };

        let motion = file.motion.unwrap_or_default();
        let motion = MotionConfig {
            threshold: motion.threshold.unwrap_or(DEFAULT_MOTION_THRESHOLD),
            blur_kernel: motion.blur_kernel.unwrap_or(DEFAULT_BLUR_KERNEL),
        };

        let recording = file.recording.unwrap_or_default();
        let trigger = match (recording.idle_ticks, recording.idle_secs) {
            (Some(ticks), _) => TriggerPolicy::IdleTicks(ticks),
            (None, Some(secs)) => TriggerPolicy::WallClock(Duration::from_secs(secs)),
            (None, None) => TriggerPolicy::WallClock(DEFAULT_RECORDING_IDLE),
        };

        let dispatch_defaults = DispatchSettings::default();
        let dispatch = file.dispatch.unwrap_or_default();
        let dispatch = DispatchSettings {
            sample_frames: dispatch.sample_frames.unwrap_or(dispatch_defaults.sample_frames),
            queue_capacity: dispatch
                .queue_capacity
                .unwrap_or(dispatch_defaults.queue_capacity),
        };

        let notify_defaults = NotifySettings::default();
        let notify = file.notify.unwrap_or_default();
        let notify = NotifySettings {
            kind: notify.kind.unwrap_or(notify_defaults.kind),
            outbox_dir: notify.outbox_dir.unwrap_or(notify_defaults.outbox_dir),
            webhook_url: notify.webhook_url,
        };

        let archive_defaults = ArchiveSettings::default();
        let archive = file.archive.unwrap_or_default();
        let archive = ArchiveSettings {
            dir: archive.dir.unwrap_or(archive_defaults.dir),
            fps: archive.fps.unwrap_or(archive_defaults.fps),
        };

        Self {
            source,
            reference_dir: file
                .reference_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_DIR)),
            recognition,
            motion,
            trigger,
            dispatch,
            notify,
            archive,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("WATCHD_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(dir) = non_empty_env("WATCHD_REFERENCE_DIR") {
            self.reference_dir = PathBuf::from(dir);
        }
        if let Some(backend) = non_empty_env("WATCHD_ENCODER") {
            self.recognition.backend = backend;
        }
        if let Some(tolerance) = non_empty_env("WATCHD_TOLERANCE") {
            self.recognition.tolerance = tolerance
                .parse()
                .map_err(|_| anyhow!("WATCHD_TOLERANCE must be a number"))?;
        }
        if let Some(idle) = non_empty_env("WATCHD_IDLE_SECS") {
            let seconds: u64 = idle.parse().map_err(|_| {
                anyhow!("WATCHD_IDLE_SECS must be an integer number of seconds")
            })?;
            self.trigger = TriggerPolicy::WallClock(Duration::from_secs(seconds));
        }
        if let Some(url) = non_empty_env("WATCHD_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
        if let Some(dir) = non_empty_env("WATCHD_ARCHIVE_DIR") {
            self.archive.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let tolerance = self.recognition.tolerance;
        if !(tolerance > 0.0 && tolerance <= 2.0) {
            return Err(anyhow!("tolerance must be in (0, 2], got {}", tolerance));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be >= 1"));
        }
        if self.archive.fps == 0 {
            return Err(anyhow!("archive fps must be >= 1"));
        }
        if self.motion.blur_kernel == 0 || self.motion.blur_kernel % 2 == 0 {
            return Err(anyhow!("motion blur_kernel must be odd"));
        }
        match self.trigger {
            TriggerPolicy::WallClock(idle) if idle.is_zero() => {
                return Err(anyhow!("recording idle duration must be greater than zero"))
            }
            _ => {}
        }
        if self.dispatch.sample_frames == 0 {
            return Err(anyhow!("dispatch sample_frames must be >= 1"));
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(anyhow!("dispatch queue_capacity must be >= 1"));
        }
        if self.recognition.backend == "tract" && self.recognition.model_path.is_none() {
            return Err(anyhow!("tract encoder requires recognition.model_path"));
        }
        if self.notify.kind == "webhook" && self.notify.webhook_url.is_none() {
            return Err(anyhow!("webhook notifier requires notify.webhook_url"));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<WatchdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
