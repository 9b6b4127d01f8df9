//! Motion gate.
//!
//! Cheap per-frame change detector that decides whether a frame is worth the
//! cost of face recognition. Frames are reduced to a blurred single-channel
//! intensity image and compared against the previously processed frame.
//!
//! The gate is best-effort: any processing error is logged and reported as "no
//! motion" so that a bad frame never takes the ingestion loop down.

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub const DEFAULT_MOTION_THRESHOLD: u8 = 25;
pub const DEFAULT_BLUR_KERNEL: usize = 21;

/// Anything that can answer "did the scene change?" for a frame.
///
/// Implementations keep their own reference state and are called exactly once
/// per ingested frame.
pub trait MotionDetector: Send {
    fn detect(&mut self, frame: &Frame) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionConfig {
    /// Per-pixel intensity delta (0..=255) that must be exceeded to count as change.
    pub threshold: u8,
    /// Gaussian kernel size (odd).
    pub blur_kernel: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MOTION_THRESHOLD,
            blur_kernel: DEFAULT_BLUR_KERNEL,
        }
    }
}

/// Intensity image produced by the preprocessing step.
struct GrayPlane {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

pub struct MotionGate {
    threshold: u8,
    kernel: Vec<f32>,
    previous: Option<GrayPlane>,
}

impl MotionGate {
    pub fn new(config: MotionConfig) -> Result<Self> {
        if config.blur_kernel == 0 || config.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur kernel must be a positive odd size, got {}",
                config.blur_kernel
            ));
        }
        Ok(Self {
            threshold: config.threshold,
            kernel: gaussian_kernel(config.blur_kernel),
            previous: None,
        })
    }

    /// Fallible core of `detect`. The reference always advances to `frame`,
    /// even when the comparison itself fails.
    pub fn try_detect(&mut self, frame: &Frame) -> Result<bool> {
        let current = self.preprocess(frame);
        let Some(previous) = self.previous.replace(current) else {
            return Ok(false);
        };
        let current = self
            .previous
            .as_ref()
            .ok_or_else(|| anyhow!("motion reference missing"))?;

        if previous.width != current.width || previous.height != current.height {
            return Err(anyhow!(
                "frame size changed from {}x{} to {}x{}",
                previous.width,
                previous.height,
                current.width,
                current.height
            ));
        }

        let threshold = self.threshold;
        Ok(previous
            .data
            .iter()
            .zip(current.data.iter())
            .any(|(a, b)| a.abs_diff(*b) > threshold))
    }

    fn preprocess(&self, frame: &Frame) -> GrayPlane {
        let gray = to_gray(frame);
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        GrayPlane {
            width,
            height,
            data: blur(&gray, width, height, &self.kernel),
        }
    }
}

impl MotionDetector for MotionGate {
    fn detect(&mut self, frame: &Frame) -> bool {
        match self.try_detect(frame) {
            Ok(motion) => motion,
            Err(e) => {
                log::warn!("motion detection failed, treating as no motion: {}", e);
                false
            }
        }
    }
}

fn to_gray(frame: &Frame) -> Vec<u8> {
    frame
        .pixels()
        .chunks_exact(3)
        .map(|px| {
            let y = 0.299_f32 * px[0] as f32 + 0.587_f32 * px[1] as f32 + 0.114_f32 * px[2] as f32;
            clamp_to_u8(y)
        })
        .collect()
}

/// Normalised 1-D Gaussian taps; sigma derived from the kernel size.
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (size / 2) as isize;
    let mut taps: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    for tap in &mut taps {
        *tap /= sum;
    }
    taps
}

/// Separable blur with reflect-101 borders.
fn blur(src: &[u8], width: usize, height: usize, kernel: &[f32]) -> Vec<u8> {
    let radius = (kernel.len() / 2) as isize;
    let mut horizontal = vec![0f32; src.len()];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0f32;
            for (k, tap) in kernel.iter().enumerate() {
                let sx = reflect101(x as isize + k as isize - radius, width);
                acc += tap * row[sx] as f32;
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = vec![0u8; src.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0f32;
            for (k, tap) in kernel.iter().enumerate() {
                let sy = reflect101(y as isize + k as isize - radius, height);
                acc += tap * horizontal[sy * width + x];
            }
            out[y * width + x] = clamp_to_u8(acc);
        }
    }
    out
}

fn reflect101(mut i: isize, len: usize) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
