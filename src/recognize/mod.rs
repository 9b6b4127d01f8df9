//! Face recognition oracle.
//!
//! - `FaceEncoder`: pluggable backends that turn a frame into face embeddings.
//! - `ReferenceSet`: the known-face embeddings, loaded once at startup.
//! - `Recognizer`: encoder + reference set + tolerance, classifying frames.

mod backend;
pub mod backends;
mod recognizer;
mod reference;
mod result;

pub use backend::{FaceEncoder, RecognitionOracle};
pub use backends::{build_encoder, ScriptedEncoder, SignatureEncoder};
pub use recognizer::{Recognizer, DEFAULT_TOLERANCE};
pub use reference::ReferenceSet;
pub use result::{FeatureVector, RecognitionResult};
