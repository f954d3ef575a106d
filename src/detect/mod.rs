//! Object detection types and target selection.
//!
//! Detections arrive from an inference engine once per frame and are
//! consumed read-only. The tracker cares about exactly one of them: the
//! highest-confidence detection of the configured target class. That
//! choice is recomputed from scratch every frame; nothing is carried
//! across frames.

use anyhow::Result;

use crate::capture::Frame;

pub mod engines;

/// Axis-aligned bounding box in pixel coordinates, origin top-left.
///
/// Coordinates are trusted engine output and are not re-validated here.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Center of the box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// One detection produced by an inference engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Detected object category.
    pub class_id: u32,
    /// Score used only for ranking within a class.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Pascal VOC class names, indexed by class id.
///
/// The detection model of the original mount was trained on VOC-20; the
/// table is used for overlay labels and friendly log lines only.
pub const VOC_CLASSES: [&str; 20] = [
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

/// Human-readable name for a class id, when one is known.
pub fn class_name(class_id: u32) -> Option<&'static str> {
    VOC_CLASSES.get(class_id as usize).copied()
}

/// Select the tracking target from a frame's detections.
///
/// Filters to exact class-id matches and returns the one with the
/// highest confidence. Ties keep the first occurrence: a later detection
/// wins only with a strictly greater confidence, so the choice is
/// deterministic. No minimum-confidence gate is applied here; the
/// engine's own threshold is the only gate.
pub fn select_target(detections: &[Detection], target_class: u32) -> Option<&Detection> {
    detections
        .iter()
        .filter(|detection| detection.class_id == target_class)
        .fold(None, |best: Option<&Detection>, candidate| match best {
            Some(best) if candidate.confidence <= best.confidence => Some(best),
            _ => Some(candidate),
        })
}

/// Inference engine seam.
///
/// Engines are configured once at startup (model, thresholds, anchor
/// geometry) and then invoked once per frame. The loop treats the engine
/// as a black box; anything it reports is passed to target selection
/// unmodified.
pub trait InferenceEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn run(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl InferenceEngine for Box<dyn InferenceEngine> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn run(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).run(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox::default(),
        }
    }

    #[test]
    fn select_target_on_empty_list_returns_none() {
        assert!(select_target(&[], 4).is_none());
    }

    #[test]
    fn select_target_without_class_match_returns_none() {
        let detections = [detection(7, 0.99), detection(14, 0.8)];
        assert!(select_target(&detections, 4).is_none());
    }

    #[test]
    fn select_target_picks_highest_confidence_within_class() {
        let detections = [detection(4, 0.2), detection(4, 0.9), detection(7, 0.99)];
        let target = select_target(&detections, 4).expect("target");
        assert_eq!(target.confidence, 0.9);
        assert_eq!(target.class_id, 4);
    }

    #[test]
    fn select_target_breaks_ties_by_first_occurrence() {
        let mut first = detection(4, 0.5);
        first.bbox.x = 10.0;
        let mut second = detection(4, 0.5);
        second.bbox.x = 200.0;

        let detections = [first, second];
        let target = select_target(&detections, 4).expect("target");
        assert_eq!(target.bbox.x, 10.0);
    }

    #[test]
    fn select_target_ignores_confidence_of_other_classes() {
        let detections = [detection(4, 0.1), detection(7, 0.99)];
        let target = select_target(&detections, 4).expect("target");
        assert_eq!(target.confidence, 0.1);
    }

    #[test]
    fn bounding_box_center() {
        let bbox = BoundingBox {
            x: 100.0,
            y: 40.0,
            width: 20.0,
            height: 60.0,
        };
        assert_eq!(bbox.center(), (110.0, 70.0));
    }

    #[test]
    fn class_names_resolve_known_ids() {
        assert_eq!(class_name(4), Some("bottle"));
        assert_eq!(class_name(14), Some("person"));
        assert_eq!(class_name(99), None);
    }
}
