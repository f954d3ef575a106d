#![cfg(feature = "engine-tract")]

//! Tract ONNX engine with YOLOv2 region decode.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::capture::Frame;
use crate::config::InferenceSettings;
use crate::detect::{BoundingBox, Detection, InferenceEngine};

/// Values per anchor in the region layer output: tx, ty, tw, th, objectness.
const BOX_FIELDS: usize = 5;

/// YOLOv2-style detector backed by a local ONNX model.
///
/// The model is loaded and optimized once at construction; thresholds
/// and anchor geometry are fixed for the process lifetime. Inference
/// runs on RGB frames matching the configured capture resolution.
pub struct TractEngine {
    model: TypedSimplePlan<TypedModel>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    anchors: Vec<(f32, f32)>,
}

impl TractEngine {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new(
        model_path: &Path,
        width: u32,
        height: u32,
        settings: &InferenceSettings,
    ) -> Result<Self> {
        if settings.anchors.is_empty() {
            return Err(anyhow!("YOLOv2 decode requires at least one anchor pair"));
        }
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            anchors: settings.anchors.clone(),
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width != self.width || frame.height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }

        let expected_len = (frame.width as usize)
            .checked_mul(frame.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if frame.pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                frame.pixels.len()
            ));
        }

        let width = frame.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, frame.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                frame.pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    /// Decode the region layer output `[1, A*(5+C), gh, gw]` into frame
    /// pixel coordinates, threshold, then suppress overlaps per class.
    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 4 || shape[0] != 1 {
            return Err(anyhow!("unexpected region layer shape {:?}", shape));
        }

        let channels = shape[1];
        let grid_h = shape[2];
        let grid_w = shape[3];
        let num_anchors = self.anchors.len();
        if channels % num_anchors != 0 || channels / num_anchors < BOX_FIELDS + 1 {
            return Err(anyhow!(
                "region layer channels {} do not fit {} anchors",
                channels,
                num_anchors
            ));
        }
        let num_classes = channels / num_anchors - BOX_FIELDS;

        let mut candidates = Vec::new();
        for anchor_idx in 0..num_anchors {
            let base = anchor_idx * (BOX_FIELDS + num_classes);
            let (anchor_w, anchor_h) = self.anchors[anchor_idx];
            for gy in 0..grid_h {
                for gx in 0..grid_w {
                    let at = |field: usize| view[[0, base + field, gy, gx]];

                    let objectness = sigmoid(at(4));
                    let (class_id, class_prob) =
                        best_class(&view, base + BOX_FIELDS, num_classes, gy, gx);
                    let confidence = objectness * class_prob;
                    if confidence < self.confidence_threshold {
                        continue;
                    }

                    let cx = (gx as f32 + sigmoid(at(0))) / grid_w as f32 * self.width as f32;
                    let cy = (gy as f32 + sigmoid(at(1))) / grid_h as f32 * self.height as f32;
                    let w = anchor_w * at(2).exp() / grid_w as f32 * self.width as f32;
                    let h = anchor_h * at(3).exp() / grid_h as f32 * self.height as f32;

                    candidates.push(Detection {
                        class_id: class_id as u32,
                        confidence,
                        bbox: BoundingBox {
                            x: cx - w / 2.0,
                            y: cy - h / 2.0,
                            width: w,
                            height: h,
                        },
                    });
                }
            }
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl InferenceEngine for TractEngine {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn run(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax over the class scores of one cell, returning the argmax and
/// its probability.
fn best_class(
    view: &tract_ndarray::ArrayViewD<'_, f32>,
    first_channel: usize,
    num_classes: usize,
    gy: usize,
    gx: usize,
) -> (usize, f32) {
    let mut max_score = f32::NEG_INFINITY;
    let mut best = 0;
    for class_idx in 0..num_classes {
        let score = view[[0, first_channel + class_idx, gy, gx]];
        if score > max_score {
            max_score = score;
            best = class_idx;
        }
    }
    let mut sum = 0.0;
    for class_idx in 0..num_classes {
        sum += (view[[0, first_channel + class_idx, gy, gx]] - max_score).exp();
    }
    (best, if sum > 0.0 { 1.0 / sum } else { 0.0 })
}

/// Greedy per-class suppression of overlapping boxes.
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept.iter().any(|existing| {
            existing.class_id == candidate.class_id
                && iou(&existing.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width).min(b.x + b.width);
    let bottom = (a.y + a.height).min(b.y + b.height);

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: f32, y: f32, side: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: side,
            height: side,
        }
    }

    fn detection(class_id: u32, confidence: f32, bbox: BoundingBox) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox,
        }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = boxed(10.0, 10.0, 20.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = boxed(0.0, 0.0, 10.0);
        let b = boxed(100.0, 100.0, 10.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn nms_keeps_highest_confidence_of_overlapping_pair() {
        let strong = detection(4, 0.9, boxed(10.0, 10.0, 20.0));
        let weak = detection(4, 0.4, boxed(12.0, 12.0, 20.0));
        let kept = non_max_suppression(vec![weak, strong.clone()], 0.3);
        assert_eq!(kept, vec![strong]);
    }

    #[test]
    fn nms_does_not_suppress_across_classes() {
        let bottle = detection(4, 0.9, boxed(10.0, 10.0, 20.0));
        let cat = detection(7, 0.4, boxed(12.0, 12.0, 20.0));
        let kept = non_max_suppression(vec![bottle.clone(), cat.clone()], 0.3);
        assert_eq!(kept.len(), 2);
    }
}
