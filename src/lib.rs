//! Turret Tracker
//!
//! This crate implements a closed-loop visual servo controller: it
//! consumes object detections over a video feed and continuously
//! repositions a two-axis pan/tilt mount so that a chosen target class
//! stays centered in frame.
//!
//! # Architecture
//!
//! The loop is single-threaded, cooperative, and synchronous. Each
//! iteration runs to completion before the next begins:
//!
//! 1. Acquire a frame (`capture`, the only blocking point)
//! 2. Run inference (`detect::engines`)
//! 3. Select the target: highest confidence of the configured class (`detect`)
//! 4. Apply the proportional correction through both servos (`tracker`, `servo`)
//! 5. Render the overlay, fire-and-forget (`display`)
//!
//! Control follows a pure proportional law with no integral or
//! derivative term. A missing target is not an error: actuation is
//! skipped and the servos hold position. Out-of-range positions are not
//! errors either: the servo clamp is total and silent. The only fatal
//! errors are invalid configuration at startup and hardware I/O failure.
//!
//! # Module Structure
//!
//! - `servo`: position-to-duty mapping and PWM channel seam
//! - `capture`: frame sources (V4L2, synthetic)
//! - `detect`: detection types, target selection, inference engines
//! - `tracker`: proportional centering controller
//! - `display`: overlay sink seam
//! - `runtime`: the frame loop over injected collaborators
//! - `config`: startup configuration (file + env), fixed for the process

pub mod capture;
pub mod config;
pub mod detect;
pub mod display;
pub mod runtime;
pub mod servo;
pub mod tracker;

pub use capture::{CameraConfig, CameraSource, CameraStats, Frame, FrameSource};
pub use config::{AxisSettings, InferenceSettings, ServoSettings, TurretConfig};
pub use detect::{
    class_name, engines::ScriptedEngine, engines::SyntheticEngine, select_target, BoundingBox,
    Detection, InferenceEngine, VOC_CLASSES,
};
#[cfg(feature = "engine-tract")]
pub use detect::engines::TractEngine;
pub use display::{DisplaySink, LogSink, NullSink};
pub use runtime::ControlLoop;
pub use servo::{open_channel, MemoryPwm, PwmChannel, Servo, ServoConfig};
pub use tracker::{FrameCenter, Gains, TrackingController};
