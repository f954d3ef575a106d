//! The per-frame control loop.
//!
//! One iteration: acquire a frame (the sole blocking point), run
//! inference, select the target, apply the proportional correction,
//! render the overlay. Frames are never buffered or queued; each one is
//! fully processed before the next is requested, so the loop needs no
//! backpressure.
//!
//! The loop has no internal stop condition. `run` keeps iterating until
//! the shutdown flag flips, which in the daemon happens only from the
//! signal handler. Tests drive `step` directly.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::capture::FrameSource;
use crate::detect::{select_target, InferenceEngine};
use crate::display::DisplaySink;
use crate::servo::Servo;
use crate::tracker::TrackingController;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Closed control loop over injected collaborators.
pub struct ControlLoop<S, E, D>
where
    S: FrameSource,
    E: InferenceEngine,
    D: DisplaySink,
{
    source: S,
    engine: E,
    sink: D,
    controller: TrackingController,
    target_class: u32,
    pan: Servo,
    tilt: Servo,
    frame_count: u64,
}

impl<S, E, D> ControlLoop<S, E, D>
where
    S: FrameSource,
    E: InferenceEngine,
    D: DisplaySink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: S,
        engine: E,
        sink: D,
        controller: TrackingController,
        target_class: u32,
        pan: Servo,
        tilt: Servo,
    ) -> Self {
        Self {
            source,
            engine,
            sink,
            controller,
            target_class,
            pan,
            tilt,
            frame_count: 0,
        }
    }

    /// Frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn pan(&self) -> &Servo {
        &self.pan
    }

    pub fn tilt(&self) -> &Servo {
        &self.tilt
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Process exactly one frame.
    ///
    /// A frame with no matching target still renders; only actuation is
    /// skipped. Errors from the source, the engine, or a servo write are
    /// fatal to the loop; nothing here retries.
    pub fn step(&mut self) -> Result<()> {
        let frame = self.source.next_frame()?;
        let detections = self.engine.run(&frame)?;

        let target = select_target(&detections, self.target_class);
        self.controller.update(target, &mut self.pan, &mut self.tilt)?;

        let label = target.map(|target| format!("{:.3}", target.confidence));
        self.sink.render(&frame, target, label.as_deref());

        self.frame_count += 1;
        Ok(())
    }

    /// Run until the shutdown flag is set.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        log::info!(
            "control loop running: engine={} target_class={}",
            self.engine.name(),
            self.target_class
        );
        let mut last_health_log = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            self.step()?;

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "health source={} frames={} pan={:.3} tilt={:.3}",
                    self.source.is_healthy(),
                    self.frame_count,
                    self.pan.position(),
                    self.tilt.position()
                );
                last_health_log = Instant::now();
            }
        }

        log::info!("control loop stopped after {} frames", self.frame_count);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;
    use crate::detect::engines::ScriptedEngine;
    use crate::detect::{BoundingBox, Detection};
    use crate::display::NullSink;
    use crate::servo::{MemoryPwm, ServoConfig};
    use crate::tracker::{FrameCenter, Gains};

    struct StaticSource {
        width: u32,
        height: u32,
    }

    impl FrameSource for StaticSource {
        fn next_frame(&mut self) -> Result<Frame> {
            Ok(Frame::new(
                vec![0; (self.width * self.height * 3) as usize],
                self.width,
                self.height,
            ))
        }
    }

    fn servo(label: &str) -> Servo {
        Servo::new(
            label,
            Box::new(MemoryPwm::new("stub://test")),
            &ServoConfig::default(),
        )
        .expect("servo")
    }

    fn control_loop(
        script: Vec<Vec<Detection>>,
    ) -> ControlLoop<StaticSource, ScriptedEngine, NullSink> {
        let gains = Gains {
            pan: 0.001,
            tilt: 0.001,
        };
        ControlLoop::new(
            StaticSource {
                width: 320,
                height: 240,
            },
            ScriptedEngine::new(script),
            NullSink,
            TrackingController::new(FrameCenter::of_resolution(320, 240), gains),
            4,
            servo("pan"),
            servo("tilt"),
        )
    }

    fn target_at(cx: f32, cy: f32) -> Detection {
        Detection {
            class_id: 4,
            confidence: 0.9,
            bbox: BoundingBox {
                x: cx - 15.0,
                y: cy - 15.0,
                width: 30.0,
                height: 30.0,
            },
        }
    }

    #[test]
    fn step_moves_pan_toward_off_center_target() -> Result<()> {
        let mut control_loop = control_loop(vec![vec![target_at(100.0, 120.0)]]);
        control_loop.step()?;

        assert!((control_loop.pan().position() - 0.56).abs() < 1e-5);
        assert_eq!(control_loop.tilt().position(), 0.5);
        assert_eq!(control_loop.frame_count(), 1);
        Ok(())
    }

    #[test]
    fn step_ignores_detections_of_other_classes() -> Result<()> {
        let mut cat = target_at(40.0, 40.0);
        cat.class_id = 7;
        let mut control_loop = control_loop(vec![vec![cat]]);
        control_loop.step()?;

        assert_eq!(control_loop.pan().position(), 0.5);
        assert_eq!(control_loop.tilt().position(), 0.5);
        Ok(())
    }

    #[test]
    fn run_stops_when_shutdown_flag_is_preset() -> Result<()> {
        let mut control_loop = control_loop(vec![]);
        let shutdown = AtomicBool::new(true);
        control_loop.run(&shutdown)?;
        assert_eq!(control_loop.frame_count(), 0);
        Ok(())
    }
}
