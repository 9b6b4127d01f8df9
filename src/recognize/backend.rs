use anyhow::Result;

use crate::frame::Frame;
use crate::recognize::result::{FeatureVector, RecognitionResult};

/// Face encoder trait: the opaque half of the recognition oracle.
///
/// Given a frame, produce one feature vector per face found (empty when there is
/// no face). Matching vectors against the reference set is done by
/// `ReferenceSet::matches`, so encoders only have to agree on vector layout.
pub trait FaceEncoder: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Encode every face in the frame.
    fn encode(&mut self, frame: &Frame) -> Result<Vec<FeatureVector>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Anything that can classify a frame as known / unknown / no face.
///
/// The detection pipeline only talks to this trait; `Recognizer` is the
/// production implementation.
pub trait RecognitionOracle: Send {
    fn recognize(&mut self, frame: &Frame) -> RecognitionResult;
}
