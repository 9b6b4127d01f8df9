//! Frame model.
//!
//! - `Frame`: owned RGB24 raster with its capture timestamp.
//! - `Timestamp`: wall-clock capture time used by every time-based decision.
//!
//! Frames are produced by the ingestion layer and handed to the pipeline for one
//! tick. Cloning a `Frame` deep-copies its pixels, so a frame kept as evidence is
//! independent of whatever buffer the capture source reuses for the next read.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::time::SystemTime;

/// Wall-clock capture time.
pub type Timestamp = SystemTime;

/// Local-time rendering used in notification text and clip names.
pub const DETECTION_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub fn format_detection_time(ts: Timestamp) -> String {
    DateTime::<Local>::from(ts).format(DETECTION_TIME_FORMAT).to_string()
}

/// Bytes per pixel for the only supported layout (RGB24, row-major, no padding).
pub const BYTES_PER_PIXEL: usize = 3;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Immutable RGB24 raster sample.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    captured_at: Timestamp,
}

impl Frame {
    /// Build a frame, validating that `data` holds exactly `width * height` RGB pixels.
    pub fn new(data: Vec<u8>, width: u32, height: u32, captured_at: Timestamp) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            captured_at,
        })
    }

    /// Frame filled with a single colour. Mostly useful for synthetic sources and tests.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], captured_at: Timestamp) -> Result<Self> {
        let len = expected_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len / BYTES_PER_PIXEL {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, captured_at)
    }

    pub fn from_rgb_image(image: RgbImage, captured_at: Timestamp) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, captured_at)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at(&self) -> Timestamp {
        self.captured_at
    }

    /// Row-major RGB24 pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// RGB value at `(x, y)`. Panics on out-of-range coordinates like slice indexing.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Copy into an `image` buffer for encoding (JPEG attachments, clip frames).
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not fit {}x{}", self.width, self.height))
    }
}

// Pixel dumps are useless in logs.
impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish_non_exhaustive()
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero"));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
