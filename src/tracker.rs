//! Proportional centering controller.
//!
//! Pure per-frame math: the signed pixel error between the frame center
//! and the target's box center, scaled by a per-axis gain, applied as a
//! relative servo adjustment. No integral or derivative term, no
//! hysteresis, no memory of previous frames. When no target is present
//! the servos hold their last position (zero-order hold).
//!
//! The vertical axis inverts the error sign: image-space Y grows
//! downward while tilt grows upward. Gains and the inversion are fixed
//! calibration constants of the mount, not derived quantities; no
//! stability claim follows from them.

use anyhow::Result;

use crate::detect::Detection;
use crate::servo::Servo;

/// Frame center in pixels, fixed once the capture format is set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameCenter {
    pub x: f32,
    pub y: f32,
}

impl FrameCenter {
    /// Center of a capture resolution.
    pub fn of_resolution(width: u32, height: u32) -> Self {
        Self {
            x: width as f32 / 2.0,
            y: height as f32 / 2.0,
        }
    }
}

/// Per-axis proportional gains, in position units per pixel of error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gains {
    pub pan: f32,
    pub tilt: f32,
}

impl Default for Gains {
    fn default() -> Self {
        // Calibrated on the original mount; the asymmetry is the
        // mount's, not a tuning rule.
        Self {
            pan: 0.000_05,
            tilt: 0.000_5,
        }
    }
}

/// Tracking controller for one pan/tilt pair.
pub struct TrackingController {
    center: FrameCenter,
    gains: Gains,
}

impl TrackingController {
    pub fn new(center: FrameCenter, gains: Gains) -> Self {
        Self { center, gains }
    }

    pub fn center(&self) -> FrameCenter {
        self.center
    }

    /// Signed pixel error from the target's box center to the frame
    /// center. Positive X error means the target sits left of center.
    pub fn centering_error(&self, target: &Detection) -> (f32, f32) {
        let (tx, ty) = target.bbox.center();
        (self.center.x - tx, self.center.y - ty)
    }

    /// Apply one frame's correction to both servos.
    ///
    /// Without a target this is a no-op: positions hold at their last
    /// value. With one, each axis moves proportionally to its error;
    /// saturation is handled entirely by the servo clamp.
    pub fn update(
        &self,
        target: Option<&Detection>,
        pan: &mut Servo,
        tilt: &mut Servo,
    ) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };

        let (err_x, err_y) = self.centering_error(target);
        pan.adjust(self.gains.pan * err_x)?;
        tilt.adjust(-(self.gains.tilt * err_y))?;

        log::trace!(
            "tracking error=({:.1}, {:.1}) pan={:.4} tilt={:.4}",
            err_x,
            err_y,
            pan.position(),
            tilt.position()
        );
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::servo::{MemoryPwm, ServoConfig};

    const QVGA_CENTER: FrameCenter = FrameCenter { x: 160.0, y: 120.0 };

    fn servo(label: &str) -> Servo {
        Servo::new(
            label,
            Box::new(MemoryPwm::new("stub://test")),
            &ServoConfig::default(),
        )
        .expect("servo")
    }

    fn target_at(cx: f32, cy: f32) -> Detection {
        Detection {
            class_id: 4,
            confidence: 0.9,
            bbox: BoundingBox {
                x: cx - 10.0,
                y: cy - 10.0,
                width: 20.0,
                height: 20.0,
            },
        }
    }

    fn controller(gains: Gains) -> TrackingController {
        TrackingController::new(QVGA_CENTER, gains)
    }

    #[test]
    fn centered_target_produces_zero_delta() -> Result<()> {
        let controller = controller(Gains::default());
        let mut pan = servo("pan");
        let mut tilt = servo("tilt");

        controller.update(Some(&target_at(160.0, 120.0)), &mut pan, &mut tilt)?;
        assert_eq!(pan.position(), 0.5);
        assert_eq!(tilt.position(), 0.5);
        Ok(())
    }

    #[test]
    fn target_left_of_center_increases_pan_by_gain_times_error() -> Result<()> {
        let gains = Gains {
            pan: 0.001,
            tilt: 0.001,
        };
        let controller = controller(gains);
        let mut pan = servo("pan");
        let mut tilt = servo("tilt");

        // Target 60 px left of center: err_x = +60.
        controller.update(Some(&target_at(100.0, 120.0)), &mut pan, &mut tilt)?;
        assert!((pan.position() - (0.5 + 0.001 * 60.0)).abs() < 1e-6);
        assert_eq!(tilt.position(), 0.5);
        Ok(())
    }

    #[test]
    fn vertical_axis_inverts_error_sign() -> Result<()> {
        let gains = Gains {
            pan: 0.001,
            tilt: 0.001,
        };
        let controller = controller(gains);
        let mut pan = servo("pan");
        let mut tilt = servo("tilt");

        // Target 40 px above center: err_y = +40, tilt moves down.
        controller.update(Some(&target_at(160.0, 80.0)), &mut pan, &mut tilt)?;
        assert!((tilt.position() - (0.5 - 0.001 * 40.0)).abs() < 1e-6);
        assert_eq!(pan.position(), 0.5);
        Ok(())
    }

    #[test]
    fn no_target_holds_both_positions() -> Result<()> {
        let controller = controller(Gains::default());
        let mut pan = servo("pan");
        let mut tilt = servo("tilt");
        pan.set_position(0.7)?;
        tilt.set_position(0.3)?;

        controller.update(None, &mut pan, &mut tilt)?;
        assert_eq!(pan.position(), 0.7);
        assert_eq!(tilt.position(), 0.3);
        Ok(())
    }

    #[test]
    fn persistent_off_center_target_saturates_at_clamp() -> Result<()> {
        let gains = Gains {
            pan: 0.01,
            tilt: 0.01,
        };
        let controller = controller(gains);
        let mut pan = servo("pan");
        let mut tilt = servo("tilt");

        // Far-left target pushes pan up every frame until the clamp pins it.
        for _ in 0..200 {
            controller.update(Some(&target_at(0.0, 120.0)), &mut pan, &mut tilt)?;
        }
        assert_eq!(pan.position(), 1.0);

        // Further frames in the same direction have no effect.
        controller.update(Some(&target_at(0.0, 120.0)), &mut pan, &mut tilt)?;
        assert_eq!(pan.position(), 1.0);
        Ok(())
    }

    #[test]
    fn centering_error_is_signed() {
        let controller = controller(Gains::default());
        let (err_x, err_y) = controller.centering_error(&target_at(200.0, 100.0));
        assert_eq!(err_x, -40.0);
        assert_eq!(err_y, 20.0);
    }
}
