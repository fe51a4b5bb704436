//! Common interface over the droid's actuators.
//!
//! The set of actuators is closed: a reversible drive motor or a position
//! servo. Which one drives the head is chosen in configuration, never probed at
//! runtime.

use embedded_hal::{digital, pwm};
use serde::Deserialize;

/// The actuator variants the droid knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// Reversible DC motor; target is a signed speed in `[-1, 1]`.
    ContinuousMotor,
    /// Hobby servo; target is an angle in degrees.
    PositionServo,
}

/// Hardware errors, reduced to the `embedded-hal` error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    Pin(digital::ErrorKind),
    Pwm(pwm::ErrorKind),
}

impl core::fmt::Display for ActuatorError {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            ActuatorError::Pin(kind) => write!(f, "direction pin error: {kind}"),
            ActuatorError::Pwm(kind) => write!(f, "pwm error: {kind}"),
        }
    }
}

/// A single hardware output with a "set target" contract.
pub trait Actuator {
    type Error: core::fmt::Debug;

    fn kind(&self) -> ActuatorKind;

    /// Move toward `target` (speed for motors, degrees for servos).
    fn set_target(
        &mut self,
        target: f32,
    ) -> Result<(), Self::Error>;

    /// Return to the safe resting state: stopped, or centered.
    fn rest(&mut self) -> Result<(), Self::Error>;

    /// Drop any holding signal. Motors are already unpowered at rest.
    fn release(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
