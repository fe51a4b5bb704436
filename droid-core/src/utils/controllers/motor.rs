//! Reversible DC motor behind an H-bridge.
//!
//! Each motor uses two direction pins and one enable PWM, the layout of the
//! common L298N/TB6612 style drivers. Speeds are signed and normalized; the
//! motor turns them into a direction plus a duty magnitude.

use embedded_hal::{
    digital::{Error as _, OutputPin},
    pwm::{Error as _, SetDutyCycle},
};

use super::actuator::{Actuator, ActuatorError, ActuatorKind};
use crate::utils::math::mixing::clamp_unit;

/// Direction a motor is being driven in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorDirection {
    Forward,
    Backward,
    /// Both direction pins low, zero duty: the motor coasts.
    Stopped,
}

/// What is actually written to one motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorState {
    pub direction: MotorDirection,
    /// Duty magnitude in `[0, 1]`.
    pub magnitude: f32,
}

impl ActuatorState {
    pub const STOPPED: Self = Self {
        direction: MotorDirection::Stopped,
        magnitude: 0.0,
    };

    /// Split a signed speed into direction and magnitude.
    ///
    /// Exactly zero (and anything non-finite) means stop, not "forward at 0".
    pub fn from_speed(speed: f32) -> Self {
        let speed = clamp_unit(speed);
        if speed > 0.0 {
            Self {
                direction: MotorDirection::Forward,
                magnitude: speed,
            }
        } else if speed < 0.0 {
            Self {
                direction: MotorDirection::Backward,
                magnitude: -speed,
            }
        } else {
            Self::STOPPED
        }
    }
}

/// H-bridge motor: `in1` high drives forward, `in2` high drives backward.
pub struct Motor<IN1, IN2, EN> {
    in1: IN1,
    in2: IN2,
    enable: EN,
    inverted: bool,
    state: Option<ActuatorState>,
}

impl<IN1, IN2, EN> Motor<IN1, IN2, EN>
where
    IN1: OutputPin,
    IN2: OutputPin,
    EN: SetDutyCycle,
{
    pub fn new(
        in1: IN1,
        in2: IN2,
        enable: EN,
    ) -> Self {
        Self {
            in1,
            in2,
            enable,
            inverted: false,
            state: None,
        }
    }

    /// Flip the motor's notion of forward (wiring polarity is configuration).
    pub fn with_inverted(
        mut self,
        inverted: bool,
    ) -> Self {
        self.inverted = inverted;
        self
    }

    /// Last state written to the hardware, if any.
    pub fn state(&self) -> Option<ActuatorState> {
        self.state
    }

    /// Drive at a signed speed in `[-1, 1]`.
    ///
    /// Repeating the current state performs no hardware writes.
    pub fn drive(
        &mut self,
        speed: f32,
    ) -> Result<(), ActuatorError> {
        let speed = if self.inverted { -speed } else { speed };
        let next = ActuatorState::from_speed(speed);
        if self.state == Some(next) {
            return Ok(());
        }

        // Forget the cached state until the write fully succeeds.
        self.state = None;
        match next.direction {
            MotorDirection::Forward => {
                self.in2.set_low().map_err(|e| ActuatorError::Pin(e.kind()))?;
                self.in1.set_high().map_err(|e| ActuatorError::Pin(e.kind()))?;
                self.write_duty(next.magnitude)?;
            }
            MotorDirection::Backward => {
                self.in1.set_low().map_err(|e| ActuatorError::Pin(e.kind()))?;
                self.in2.set_high().map_err(|e| ActuatorError::Pin(e.kind()))?;
                self.write_duty(next.magnitude)?;
            }
            MotorDirection::Stopped => {
                self.enable
                    .set_duty_cycle_fully_off()
                    .map_err(|e| ActuatorError::Pwm(e.kind()))?;
                self.in1.set_low().map_err(|e| ActuatorError::Pin(e.kind()))?;
                self.in2.set_low().map_err(|e| ActuatorError::Pin(e.kind()))?;
            }
        }
        self.state = Some(next);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ActuatorError> {
        self.drive(0.0)
    }

    fn write_duty(
        &mut self,
        magnitude: f32,
    ) -> Result<(), ActuatorError> {
        let max = self.enable.max_duty_cycle();
        let duty = libm::roundf(magnitude * max as f32) as u16;
        self.enable
            .set_duty_cycle(duty.min(max))
            .map_err(|e| ActuatorError::Pwm(e.kind()))
    }
}

impl<IN1, IN2, EN> Actuator for Motor<IN1, IN2, EN>
where
    IN1: OutputPin,
    IN2: OutputPin,
    EN: SetDutyCycle,
{
    type Error = ActuatorError;

    fn kind(&self) -> ActuatorKind {
        ActuatorKind::ContinuousMotor
    }

    fn set_target(
        &mut self,
        target: f32,
    ) -> Result<(), Self::Error> {
        self.drive(target)
    }

    fn rest(&mut self) -> Result<(), Self::Error> {
        self.stop()
    }
}
