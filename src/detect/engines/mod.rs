//! Inference engines.
//!
//! Engines implement `InferenceEngine` and are selected once at startup:
//! - Synthetic engine (hardware-free demo runs)
//! - Scripted engine (deterministic playback for tests)
//! - Tract ONNX engine with YOLOv2 region decode (feature: engine-tract)

use anyhow::Result;

use crate::config::InferenceSettings;
use crate::detect::InferenceEngine;

pub mod scripted;
pub mod synthetic;
#[cfg(feature = "engine-tract")]
pub mod tract;

pub use scripted::ScriptedEngine;
pub use synthetic::SyntheticEngine;
#[cfg(feature = "engine-tract")]
pub use tract::TractEngine;

/// Build the inference engine described by the settings.
///
/// A configured model path selects the tract engine; without one the
/// synthetic engine is used so the loop can run end-to-end on stub
/// hardware.
pub fn from_settings(
    settings: &InferenceSettings,
    target_class: u32,
    width: u32,
    height: u32,
) -> Result<Box<dyn InferenceEngine>> {
    match &settings.model_path {
        Some(model_path) => {
            #[cfg(feature = "engine-tract")]
            {
                let engine = TractEngine::new(model_path, width, height, settings)?;
                Ok(Box::new(engine))
            }
            #[cfg(not(feature = "engine-tract"))]
            {
                anyhow::bail!(
                    "model {} requires the engine-tract feature",
                    model_path.display()
                )
            }
        }
        None => Ok(Box::new(SyntheticEngine::new(target_class, width, height))),
    }
}
