//! Frame ingestion sources.
//!
//! - Synthetic scene (`stub://name`) for demos and tests
//! - Image-sequence replay (a local directory of stills, played in name order)
//!
//! A source that cannot be opened fails `connect`; a read error mid-stream is
//! returned from `next_frame`. Both are fatal to the ingestion loop. A source
//! that simply runs out of frames returns `Ok(None)`.

pub mod image_dir;
pub mod synthetic;

use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::config::SourceSettings;
use crate::frame::{Frame, Timestamp};

pub use image_dir::ImageDirSource;
pub use synthetic::SyntheticSource;

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

pub trait FrameSource: Send {
    /// Open the stream. Failure here means the source was not found.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Pick a source implementation from the configured URL.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    let url = settings.url.trim();
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(settings.clone())?));
    }
    let path = url.strip_prefix("file://").unwrap_or(url);
    if path.is_empty() || path.contains("://") {
        return Err(anyhow!(
            "unsupported source url '{}'; expected stub://<name> or a local directory",
            settings.url
        ));
    }
    Ok(Box::new(ImageDirSource::new(Path::new(path), settings.target_fps)?))
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Capture clock for sources without their own timing: frame `n` is stamped
/// `start + n / fps`, so replays keep a steady rate regardless of decode speed.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FrameClock {
    start: Timestamp,
    interval: Duration,
}

impl FrameClock {
    pub(crate) fn new(start: Timestamp, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(anyhow!("target fps must be >= 1"));
        }
        Ok(Self {
            start,
            interval: Duration::from_secs(1) / fps,
        })
    }

    pub(crate) fn starting_now(fps: u32) -> Result<Self> {
        Self::new(SystemTime::now(), fps)
    }

    pub(crate) fn stamp(&self, frame_index: u64) -> Timestamp {
        let nanos = self.interval.as_nanos() * u128::from(frame_index);
        let offset = Duration::new(
            (nanos / NANOS_PER_SEC) as u64,
            (nanos % NANOS_PER_SEC) as u32,
        );
        self.start + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_spaces_frames_by_interval() {
        let clock = FrameClock::new(SystemTime::UNIX_EPOCH, 10).unwrap();
        assert_eq!(
            clock.stamp(25).duration_since(SystemTime::UNIX_EPOCH).unwrap(),
            Duration::from_millis(2_500)
        );
    }

    #[test]
    fn clock_does_not_wrap_past_u32_frames() {
        let clock = FrameClock::new(SystemTime::UNIX_EPOCH, 10).unwrap();
        let index = u64::from(u32::MAX) + 1;
        assert_eq!(
            clock.stamp(index).duration_since(SystemTime::UNIX_EPOCH).unwrap(),
            Duration::from_millis(index * 100)
        );
        assert!(clock.stamp(index) > clock.stamp(1));
    }

    #[test]
    fn rejects_remote_urls() {
        let settings = SourceSettings {
            url: "rtsp://camera/stream".to_string(),
            ..SourceSettings::default()
        };
        assert!(open_source(&settings).is_err());
    }
}
