//! Module Exports
//!
//! Hardware owners of the droid. Each piece of hardware has exactly one task
//! that writes to it, fed over a channel or the shared command cell.
//!
//! - `actuator`: the closed actuator interface
//! - `motor`: H-bridge drive motors
//! - `servo`: the head's position servo
//! - `drive`: control loop and drive owner task
//! - `head`: head pan owner task
//! - `audio`: audio commands and ambient chatter

pub mod actuator;
pub mod audio;
pub mod drive;
pub mod head;
pub mod motor;
pub mod servo;

pub use actuator::{Actuator, ActuatorError, ActuatorKind};
pub use audio::{AudioCommand, Chatter, Clip, AUDIO_CHANNEL};
pub use drive::{control_state, ControlState, DriveController, DriveTrain, COMMANDS};
pub use head::{head_angle, HeadCommand, HeadController, HEAD_CHANNEL};
pub use motor::Motor;
pub use servo::{Servo, ServoPosition, ServoRange};
