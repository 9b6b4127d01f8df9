use anyhow::Result;

use crate::frame::Frame;
use crate::recognize::backend::FaceEncoder;
use crate::recognize::result::FeatureVector;

const GRID: u32 = 4;
const DEFAULT_MIN_CONTRAST: f32 = 12.0;

/// CPU appearance-signature encoder.
///
/// Not a face model: it reports a "face" whenever the frame has enough
/// luminance contrast and encodes it as a coarse colour grid, scaled so the
/// Euclidean distance between two signatures is the RMS colour distance per
/// cell (0..=1.73). Good enough for synthetic streams and wiring checks; real
/// deployments use the `tract` backend with an embedding model.
pub struct SignatureEncoder {
    min_contrast: f32,
}

impl SignatureEncoder {
    pub fn new() -> Self {
        Self {
            min_contrast: DEFAULT_MIN_CONTRAST,
        }
    }

    /// Override the luminance standard deviation below which a frame is faceless.
    pub fn with_min_contrast(mut self, min_contrast: f32) -> Self {
        self.min_contrast = min_contrast;
        self
    }
}

impl Default for SignatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceEncoder for SignatureEncoder {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn encode(&mut self, frame: &Frame) -> Result<Vec<FeatureVector>> {
        if luminance_stddev(frame) < self.min_contrast {
            return Ok(Vec::new());
        }

        let cells = (GRID * GRID) as usize;
        let mut sums = vec![[0f64; 3]; cells];
        let mut counts = vec![0u64; cells];
        for y in 0..frame.height() {
            let gy = (y * GRID / frame.height()).min(GRID - 1);
            for x in 0..frame.width() {
                let gx = (x * GRID / frame.width()).min(GRID - 1);
                let cell = (gy * GRID + gx) as usize;
                let px = frame.pixel(x, y);
                for (channel, value) in px.iter().enumerate() {
                    sums[cell][channel] += *value as f64;
                }
                counts[cell] += 1;
            }
        }

        let scale = 1.0 / (cells as f64).sqrt();
        let mut values = Vec::with_capacity(cells * 3);
        for (sum, count) in sums.iter().zip(counts.iter()) {
            let count = (*count).max(1) as f64;
            for channel in sum {
                values.push((channel / count / 255.0 * scale) as f32);
            }
        }
        Ok(vec![FeatureVector::new(values)?])
    }
}

fn luminance_stddev(frame: &Frame) -> f32 {
    let lumas: Vec<f32> = frame
        .pixels()
        .chunks_exact(3)
        .map(|px| 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
        .collect();
    let n = lumas.len() as f32;
    let mean = lumas.iter().sum::<f32>() / n;
    let variance = lumas.iter().map(|l| (l - mean) * (l - mean)).sum::<f32>() / n;
    variance.sqrt()
}
