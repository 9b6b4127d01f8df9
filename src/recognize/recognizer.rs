use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::recognize::backend::{FaceEncoder, RecognitionOracle};
use crate::recognize::reference::ReferenceSet;
use crate::recognize::result::RecognitionResult;

/// Default match tolerance (Euclidean distance). Lower is stricter.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Encoder + reference set + tolerance.
pub struct Recognizer {
    encoder: Box<dyn FaceEncoder>,
    references: ReferenceSet,
    tolerance: f32,
    calls: u64,
}

impl Recognizer {
    pub fn new(
        encoder: Box<dyn FaceEncoder>,
        references: ReferenceSet,
        tolerance: f32,
    ) -> Result<Self> {
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(anyhow!("tolerance must be a positive number, got {}", tolerance));
        }
        Ok(Self {
            encoder,
            references,
            tolerance,
            calls: 0,
        })
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn encoder_name(&self) -> &'static str {
        self.encoder.name()
    }

    /// Number of recognition attempts so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Classify a frame. A frame is known when any face in it matches any reference.
    pub fn classify(&mut self, frame: &Frame) -> Result<RecognitionResult> {
        self.calls += 1;
        let encodings = self.encoder.encode(frame)?;
        if encodings.is_empty() {
            return Ok(RecognitionResult::NoFace);
        }
        let known = encodings
            .iter()
            .any(|encoding| self.references.matches(encoding, self.tolerance));
        Ok(if known {
            RecognitionResult::Known
        } else {
            RecognitionResult::Unknown
        })
    }
}

impl RecognitionOracle for Recognizer {
    fn recognize(&mut self, frame: &Frame) -> RecognitionResult {
        match self.classify(frame) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("{} encoder failed, treating as no face: {:#}", self.encoder.name(), e);
                RecognitionResult::NoFace
            }
        }
    }
}
