//! Scripted engine for tests.

use std::collections::VecDeque;

use anyhow::Result;

use crate::capture::Frame;
use crate::detect::{Detection, InferenceEngine};

/// Plays back a fixed per-frame sequence of detection lists.
///
/// Once the script runs out, every further frame reports no detections,
/// which exercises the loop's hold behavior.
pub struct ScriptedEngine {
    script: VecDeque<Vec<Detection>>,
}

impl ScriptedEngine {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Vec<Detection>>,
    {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Frames remaining in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn run(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
