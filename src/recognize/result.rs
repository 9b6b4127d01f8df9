use anyhow::{anyhow, Result};

/// Fixed-length face embedding produced by a `FaceEncoder`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(anyhow!("feature vector must not be empty"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("feature vector contains non-finite values"));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance, or `None` when the dimensions differ.
    pub fn distance(&self, other: &FeatureVector) -> Option<f32> {
        if self.0.len() != other.0.len() {
            return None;
        }
        let sum: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }
}

/// Outcome of one recognition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognitionResult {
    /// No face found (or the oracle could not say). Does not drive state.
    NoFace,
    /// At least one face matched the reference set.
    Known,
    /// Faces were found and none matched.
    Unknown,
}
