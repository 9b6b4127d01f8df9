//! Evidence buffer for one unknown-presence episode.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::frame::Frame;

/// Frames collected while an unknown presence is observed.
///
/// Unbounded on purpose: the trigger policy is what forces a flush.
#[derive(Debug, Default)]
pub struct EvidenceAccumulator {
    frames: Vec<Frame>,
}

impl EvidenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of `frame`.
    pub fn record(&mut self, frame: &Frame) {
        self.frames.push(frame.clone());
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `min(n, len)` distinct frames chosen uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Frame> {
        self.frames.choose_multiple(rng, n).cloned().collect()
    }

    /// Take every frame, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.frames)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Approximate pixel memory held by the buffer.
    pub fn memory_bytes(&self) -> usize {
        self.frames.iter().map(Frame::byte_len).sum()
    }
}
