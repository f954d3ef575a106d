//! Synthetic engine for hardware-free runs.

use anyhow::Result;

use crate::capture::Frame;
use crate::detect::{BoundingBox, Detection, InferenceEngine};

/// Box size as a fraction of the frame's smaller dimension.
const BOX_FRACTION: f32 = 0.25;
/// Orbit radius as a fraction of the frame's smaller dimension.
const ORBIT_FRACTION: f32 = 0.3;
/// Frames per full orbit.
const ORBIT_PERIOD_FRAMES: f32 = 120.0;

/// Reports a single detection of the configured class orbiting the frame
/// center, so the servos have something to chase when no model is
/// configured. Confidence wobbles slightly to keep log output honest.
pub struct SyntheticEngine {
    class_id: u32,
    width: f32,
    height: f32,
    frame_count: u64,
}

impl SyntheticEngine {
    pub fn new(class_id: u32, width: u32, height: u32) -> Self {
        Self {
            class_id,
            width: width as f32,
            height: height as f32,
            frame_count: 0,
        }
    }
}

impl InferenceEngine for SyntheticEngine {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn run(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.frame_count += 1;

        let minor = self.width.min(self.height);
        let side = minor * BOX_FRACTION;
        let radius = minor * ORBIT_FRACTION;
        let phase = self.frame_count as f32 / ORBIT_PERIOD_FRAMES * std::f32::consts::TAU;

        let center_x = self.width / 2.0 + radius * phase.cos();
        let center_y = self.height / 2.0 + radius * phase.sin();

        let detection = Detection {
            class_id: self.class_id,
            confidence: 0.8 + 0.1 * phase.sin(),
            bbox: BoundingBox {
                x: center_x - side / 2.0,
                y: center_y - side / 2.0,
                width: side,
                height: side,
            },
        };
        Ok(vec![detection])
    }
}
