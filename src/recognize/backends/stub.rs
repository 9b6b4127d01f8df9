use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::frame::Frame;
use crate::recognize::backend::FaceEncoder;
use crate::recognize::result::FeatureVector;

enum Step {
    Faces(Vec<FeatureVector>),
    Error(String),
}

/// Scripted encoder for tests. Replays queued answers in order and reports no
/// face once the script runs out.
#[derive(Default)]
pub struct ScriptedEncoder {
    script: VecDeque<Step>,
    calls: usize,
}

impl ScriptedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_faces(&mut self, faces: Vec<FeatureVector>) {
        self.script.push_back(Step::Faces(faces));
    }

    pub fn push_error(&mut self, message: &str) {
        self.script.push_back(Step::Error(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl FaceEncoder for ScriptedEncoder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn encode(&mut self, _frame: &Frame) -> Result<Vec<FeatureVector>> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Step::Faces(faces)) => Ok(faces),
            Some(Step::Error(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}
