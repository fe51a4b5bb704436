//! Hobby servo on a 50 Hz PWM line.
//!
//! Angles map linearly onto the usual 2.5 %–12.5 % duty window (0.5–2.5 ms of a
//! 20 ms period). The head mechanism stalls near the ends of the nominal
//! 0–180° travel, so every command is clamped to a narrower [`ServoRange`].

use embedded_hal::pwm::{Error as _, SetDutyCycle};
use serde::Deserialize;

use super::actuator::{Actuator, ActuatorError, ActuatorKind};

/// Duty cycle (percent) at 0°.
pub const MIN_DUTY_PERCENT: f32 = 2.5;
/// Duty cycle (percent) at 180°.
pub const MAX_DUTY_PERCENT: f32 = 12.5;
/// Nominal servo travel in degrees.
pub const NOMINAL_TRAVEL_DEG: f32 = 180.0;

/// Map an angle in the nominal 0–180° range to a duty cycle percentage.
pub fn angle_to_duty(angle: f32) -> f32 {
    let angle = if angle.is_finite() {
        angle.clamp(0.0, NOMINAL_TRAVEL_DEG)
    } else {
        0.0
    };
    MIN_DUTY_PERCENT + (angle / NOMINAL_TRAVEL_DEG) * (MAX_DUTY_PERCENT - MIN_DUTY_PERCENT)
}

/// Mechanically safe sub-range of the servo, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServoRange {
    pub min: f32,
    pub max: f32,
    pub center: f32,
}

impl Default for ServoRange {
    fn default() -> Self {
        Self {
            min: 20.0,
            max: 140.0,
            center: 80.0,
        }
    }
}

impl ServoRange {
    /// Clamp into `[min, max]`; non-finite angles resolve to center.
    pub fn clamp(
        &self,
        angle: f32,
    ) -> f32 {
        if angle.is_finite() {
            angle.clamp(self.min, self.max)
        } else {
            self.center
        }
    }

    pub fn contains(
        &self,
        angle: f32,
    ) -> bool {
        (self.min..=self.max).contains(&angle)
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && 0.0 <= self.min
            && self.min < self.max
            && self.max <= NOMINAL_TRAVEL_DEG
            && self.contains(self.center)
    }

    pub fn position(
        &self,
        position: ServoPosition,
    ) -> f32 {
        match position {
            ServoPosition::Left => self.min,
            ServoPosition::LeftCenter => (self.min + self.center) / 2.0,
            ServoPosition::Center => self.center,
            ServoPosition::RightCenter => (self.center + self.max) / 2.0,
            ServoPosition::Right => self.max,
        }
    }
}

/// Named head positions offered by the control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoPosition {
    Left,
    LeftCenter,
    Center,
    RightCenter,
    Right,
}

impl ServoPosition {
    /// Parse the panel's kebab-case button name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "left-center" => Some(Self::LeftCenter),
            "center" => Some(Self::Center),
            "right-center" => Some(Self::RightCenter),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Position servo driven through a `SetDutyCycle` channel.
pub struct Servo<P> {
    pwm: P,
    range: ServoRange,
    last_angle: Option<f32>,
    released: bool,
}

impl<P: SetDutyCycle> Servo<P> {
    pub fn new(
        pwm: P,
        range: ServoRange,
    ) -> Self {
        Self {
            pwm,
            range,
            last_angle: None,
            released: true,
        }
    }

    pub fn range(&self) -> ServoRange {
        self.range
    }

    pub fn last_angle(&self) -> Option<f32> {
        self.last_angle
    }

    /// Command a new angle.
    ///
    /// The angle is clamped to the safe range first. Returns `Ok(false)` when
    /// the clamped angle equals the last commanded one and nothing was written.
    pub fn set_angle(
        &mut self,
        angle: f32,
    ) -> Result<bool, ActuatorError> {
        let angle = self.range.clamp(angle);
        if self.last_angle == Some(angle) {
            return Ok(false);
        }

        let max = self.pwm.max_duty_cycle();
        let duty = libm::roundf(angle_to_duty(angle) / 100.0 * max as f32) as u16;
        self.pwm
            .set_duty_cycle(duty.min(max))
            .map_err(|e| ActuatorError::Pwm(e.kind()))?;
        self.last_angle = Some(angle);
        self.released = false;
        tracing::debug!(angle, duty, "servo angle written");
        Ok(true)
    }

    /// Drop the pulse to 0 % so the servo stops hunting.
    ///
    /// The last angle is kept; the next different angle reasserts the pulse.
    pub fn release(&mut self) -> Result<(), ActuatorError> {
        if self.released {
            return Ok(());
        }
        self.pwm
            .set_duty_cycle_fully_off()
            .map_err(|e| ActuatorError::Pwm(e.kind()))?;
        self.released = true;
        Ok(())
    }
}

impl<P: SetDutyCycle> Actuator for Servo<P> {
    type Error = ActuatorError;

    fn kind(&self) -> ActuatorKind {
        ActuatorKind::PositionServo
    }

    fn set_target(
        &mut self,
        target: f32,
    ) -> Result<(), Self::Error> {
        self.set_angle(target).map(|_| ())
    }

    fn rest(&mut self) -> Result<(), Self::Error> {
        let center = self.range.center;
        self.set_angle(center).map(|_| ())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        Servo::release(self)
    }
}
