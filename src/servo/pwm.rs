//! PWM output channels.
//!
//! A `PwmChannel` is the hardware seam below a `Servo`. The channel is
//! responsible for:
//! - Holding one hardware PWM output (one per axis, never shared)
//! - Applying the carrier frequency once at servo construction
//! - Applying duty-cycle writes synchronously, fire-and-forget
//!
//! The channel MUST NOT:
//! - Queue or coalesce duty writes
//! - Retry failed writes
//! - Change frequency after construction

use anyhow::{anyhow, Result};

#[cfg(feature = "pwm-sysfs")]
use anyhow::Context;
#[cfg(feature = "pwm-sysfs")]
use std::path::PathBuf;

/// Hardware PWM output channel.
///
/// Implementations write directly to a PWM peripheral. A write is a
/// single synchronous register update with no acknowledgment; failure
/// propagates as a fatal error to the caller.
pub trait PwmChannel: Send {
    /// Channel identifier for logging.
    fn name(&self) -> &str;

    /// Set the carrier frequency in Hz. Called exactly once, at servo
    /// construction, before any duty write.
    fn set_frequency(&mut self, hz: u32) -> Result<()>;

    /// Set the duty cycle as a percentage of the PWM period.
    fn set_duty_cycle(&mut self, percent: f32) -> Result<()>;
}

/// Open a PWM channel from a channel identifier.
///
/// `stub://<name>` yields an in-memory channel; anything else is treated
/// as a sysfs PWM path (feature: pwm-sysfs).
pub fn open_channel(identifier: &str) -> Result<Box<dyn PwmChannel>> {
    if identifier.starts_with("stub://") {
        return Ok(Box::new(MemoryPwm::new(identifier)));
    }
    #[cfg(feature = "pwm-sysfs")]
    {
        Ok(Box::new(SysfsPwm::new(identifier)?))
    }
    #[cfg(not(feature = "pwm-sysfs"))]
    {
        Err(anyhow!(
            "hardware PWM channel {} requires the pwm-sysfs feature",
            identifier
        ))
    }
}

// ----------------------------------------------------------------------------
// In-memory channel (stub://) for tests and hardware-free runs
// ----------------------------------------------------------------------------

/// In-memory PWM channel. Records every write so tests can assert on the
/// exact duty sequence a servo produced.
pub struct MemoryPwm {
    name: String,
    frequency_hz: Option<u32>,
    duty_writes: Vec<f32>,
}

impl MemoryPwm {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            frequency_hz: None,
            duty_writes: Vec::new(),
        }
    }

    /// Frequency applied at construction, if any.
    pub fn frequency_hz(&self) -> Option<u32> {
        self.frequency_hz
    }

    /// Every duty write issued so far, oldest first.
    pub fn duty_writes(&self) -> &[f32] {
        &self.duty_writes
    }

    /// Most recent duty write.
    pub fn last_duty(&self) -> Option<f32> {
        self.duty_writes.last().copied()
    }
}

impl PwmChannel for MemoryPwm {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_frequency(&mut self, hz: u32) -> Result<()> {
        if self.frequency_hz.is_some() {
            return Err(anyhow!("PWM frequency is fixed after construction"));
        }
        self.frequency_hz = Some(hz);
        Ok(())
    }

    fn set_duty_cycle(&mut self, percent: f32) -> Result<()> {
        self.duty_writes.push(percent);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Sysfs channel for Linux PWM peripherals
// ----------------------------------------------------------------------------

/// Sysfs-backed PWM channel (e.g. `/sys/class/pwm/pwmchip0/pwm0`).
///
/// Writes `period` once when the frequency is applied, then `duty_cycle`
/// on every position update. Both are plain nanosecond values.
#[cfg(feature = "pwm-sysfs")]
pub struct SysfsPwm {
    path: PathBuf,
    name: String,
    period_ns: Option<u64>,
}

#[cfg(feature = "pwm-sysfs")]
impl SysfsPwm {
    pub fn new(path: &str) -> Result<Self> {
        let path = PathBuf::from(path);
        if !path.is_dir() {
            return Err(anyhow!("PWM channel path {} does not exist", path.display()));
        }
        let name = path.display().to_string();
        Ok(Self {
            path,
            name,
            period_ns: None,
        })
    }

    fn write_attr(&self, attr: &str, value: u64) -> Result<()> {
        let attr_path = self.path.join(attr);
        std::fs::write(&attr_path, value.to_string())
            .with_context(|| format!("write {} to {}", value, attr_path.display()))
    }
}

#[cfg(feature = "pwm-sysfs")]
impl PwmChannel for SysfsPwm {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_frequency(&mut self, hz: u32) -> Result<()> {
        if self.period_ns.is_some() {
            return Err(anyhow!("PWM frequency is fixed after construction"));
        }
        if hz == 0 {
            return Err(anyhow!("PWM frequency must be non-zero"));
        }
        let period_ns = 1_000_000_000u64 / hz as u64;
        self.write_attr("period", period_ns)?;
        self.write_attr("enable", 1)?;
        self.period_ns = Some(period_ns);
        Ok(())
    }

    fn set_duty_cycle(&mut self, percent: f32) -> Result<()> {
        let period_ns = self
            .period_ns
            .ok_or_else(|| anyhow!("PWM frequency not applied before duty write"))?;
        let duty_ns = (period_ns as f64 * (percent as f64 / 100.0)) as u64;
        self.write_attr("duty_cycle", duty_ns)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pwm_records_writes_in_order() -> Result<()> {
        let mut pwm = MemoryPwm::new("stub://pan");
        pwm.set_frequency(50)?;
        pwm.set_duty_cycle(2.8)?;
        pwm.set_duty_cycle(7.15)?;

        assert_eq!(pwm.frequency_hz(), Some(50));
        assert_eq!(pwm.duty_writes(), &[2.8, 7.15]);
        assert_eq!(pwm.last_duty(), Some(7.15));
        Ok(())
    }

    #[test]
    fn memory_pwm_rejects_second_frequency_write() {
        let mut pwm = MemoryPwm::new("stub://pan");
        pwm.set_frequency(50).unwrap();
        assert!(pwm.set_frequency(60).is_err());
    }

    #[test]
    fn open_channel_resolves_stub_scheme() -> Result<()> {
        let channel = open_channel("stub://tilt")?;
        assert_eq!(channel.name(), "stub://tilt");
        Ok(())
    }
}
