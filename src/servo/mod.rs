//! Servo position control.
//!
//! A `Servo` owns exactly one PWM channel and maps a normalized position
//! in [0, 1] onto a calibrated duty-cycle range. Every position write
//! clamps first, then recomputes the duty and pushes it to hardware.
//! There is no way to mutate the position without going through the
//! clamp; the field is private and both mutators share one apply path.
//!
//! The two turret axes are two independent `Servo` instances with
//! distinct channels. No peripheral state is shared between them.

use anyhow::{anyhow, Result};

pub mod pwm;

pub use pwm::{open_channel, MemoryPwm, PwmChannel};

/// Calibration for one servo axis.
///
/// Duty values are percentages of the PWM period. The usable range of a
/// hobby servo is a narrow band of the period (roughly 3-12% at 50 Hz),
/// measured per mount during calibration.
#[derive(Clone, Debug)]
pub struct ServoConfig {
    /// PWM carrier frequency in Hz, fixed after construction.
    pub frequency_hz: u32,
    /// Duty percentage at position 0.0.
    pub min_duty: f32,
    /// Duty percentage at position 1.0. Must exceed `min_duty`.
    pub max_duty: f32,
    /// Starting position, clamped silently into [0, 1].
    pub initial_position: f32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 50,
            min_duty: 2.8,
            max_duty: 11.5,
            initial_position: 0.5,
        }
    }
}

/// One servo axis bound to one PWM channel.
pub struct Servo {
    label: String,
    channel: Box<dyn PwmChannel>,
    min_duty: f32,
    max_duty: f32,
    position: f32,
}

impl Servo {
    /// Bind a servo to a PWM channel and drive it to the initial position.
    ///
    /// Fails when the duty range or frequency is invalid. An out-of-range
    /// initial position is not an error; it is clamped like any other
    /// position write.
    pub fn new(label: &str, mut channel: Box<dyn PwmChannel>, config: &ServoConfig) -> Result<Self> {
        if !(config.min_duty < config.max_duty) {
            return Err(anyhow!(
                "servo {}: min_duty {} must be below max_duty {}",
                label,
                config.min_duty,
                config.max_duty
            ));
        }
        if config.frequency_hz == 0 {
            return Err(anyhow!("servo {}: PWM frequency must be non-zero", label));
        }

        channel.set_frequency(config.frequency_hz)?;

        let mut servo = Self {
            label: label.to_string(),
            channel,
            min_duty: config.min_duty,
            max_duty: config.max_duty,
            position: 0.0,
        };
        servo.set_position(config.initial_position)?;
        Ok(servo)
    }

    /// Axis label for logging.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current position, always within [0, 1].
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Duty percentage currently applied to the channel.
    pub fn duty(&self) -> f32 {
        self.duty_for(self.position)
    }

    /// Set the absolute position. The value is clamped into [0, 1] and
    /// the resulting duty is written to hardware immediately.
    pub fn set_position(&mut self, position: f32) -> Result<()> {
        self.position = position.clamp(0.0, 1.0);
        let duty = self.duty_for(self.position);
        self.channel.set_duty_cycle(duty)?;
        log::trace!(
            "servo {}: position={:.4} duty={:.3}",
            self.label,
            self.position,
            duty
        );
        Ok(())
    }

    /// Adjust the position by a signed delta. Saturates at the range
    /// bounds; an adjustment past a bound pins the position there.
    pub fn adjust(&mut self, delta: f32) -> Result<()> {
        self.set_position(self.position + delta)
    }

    fn duty_for(&self, position: f32) -> f32 {
        self.min_duty + position * (self.max_duty - self.min_duty)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
