//! Simulated GPIO and PWM lines.
//!
//! They implement the `embedded-hal` traits the core drives and log every
//! change, so the control stack runs unmodified on a development machine.

use std::convert::Infallible;

use embedded_hal::{digital, pwm};

/// Digital output that logs level changes.
pub struct LoggedPin {
    name: &'static str,
    high: Option<bool>,
}

impl LoggedPin {
    pub fn new(name: &'static str) -> Self {
        Self { name, high: None }
    }

    fn set(
        &mut self,
        high: bool,
    ) {
        if self.high != Some(high) {
            tracing::debug!(pin = self.name, high, "gpio");
            self.high = Some(high);
        }
    }
}

impl digital::ErrorType for LoggedPin {
    type Error = Infallible;
}

impl digital::OutputPin for LoggedPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

/// PWM channel that logs duty changes as a percentage.
pub struct LoggedPwm {
    name: &'static str,
    max: u16,
    duty: u16,
}

impl LoggedPwm {
    pub fn new(
        name: &'static str,
        max: u16,
    ) -> Self {
        Self { name, max, duty: 0 }
    }
}

impl pwm::ErrorType for LoggedPwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for LoggedPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        if duty != self.duty {
            let percent = duty as f32 * 100.0 / self.max as f32;
            tracing::debug!(pwm = self.name, duty, percent, "pwm");
            self.duty = duty;
        }
        Ok(())
    }
}
