//! Runtime configuration.
//!
//! Every section has defaults matching the reference build (20 % dead zone,
//! 50 ms drive tick, servo safe range 20–140° centered at 80°), so a JSON file
//! only needs to name what differs. Wiring polarity and angle conventions
//! changed between hardware revisions and therefore live here, not in code.

use serde::Deserialize;

use crate::utils::{
    controllers::{actuator::ActuatorKind, servo::ServoRange},
    math::{mixing::MAX_DEAD_ZONE, tracking::TrackingConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Stick dead zone in `[0, MAX_DEAD_ZONE]`.
    pub dead_zone: f32,
    /// Control loop period.
    pub tick_ms: u64,
    /// A command older than this stops the drive.
    pub input_timeout_ms: u64,
    pub invert_left: bool,
    pub invert_right: bool,
    /// Exchange left and right outputs.
    pub swap_sides: bool,
    /// Wheel speed above which the droid squeals.
    pub alert_threshold: f32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            dead_zone: 0.2,
            tick_ms: 50,
            input_timeout_ms: 500,
            invert_left: false,
            invert_right: false,
            swap_sides: false,
            alert_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    /// Servo on a PWM line, or a DC motor emulating one.
    pub actuator: ActuatorKind,
    pub range: ServoRange,
    /// Time the servo gets to reach a new angle before the pulse is dropped.
    pub settle_ms: u64,
    pub release_after_settle: bool,
    /// Speed used when a DC motor emulates a position.
    pub nudge_speed: f32,
    /// Estimated slew rate of the DC head at `nudge_speed`.
    pub degrees_per_second: f32,
    pub invert: bool,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            actuator: ActuatorKind::PositionServo,
            range: ServoRange::default(),
            settle_ms: 300,
            release_after_settle: true,
            nudge_speed: 0.1,
            degrees_per_second: 10.0,
            invert: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Play random slices of the ambient clip while idle.
    pub ambient: bool,
    /// Length of the ambient clip.
    pub clip_len_s: u32,
    /// Length of each ambient slice.
    pub segment_s: u32,
    pub min_gap_s: u32,
    pub max_gap_s: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ambient: true,
            clip_len_s: 9,
            segment_s: 2,
            min_gap_s: 5,
            max_gap_s: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct DroidConfig {
    pub drive: DriveConfig,
    pub head: HeadConfig,
    pub tracking: TrackingConfig,
    pub audio: AudioConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound for each shutdown step.
    pub step_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 2000,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    DeadZone(f32),
    TickInterval(u64),
    InputTimeout(u64),
    ServoRange(ServoRange),
    NudgeSpeed(f32),
    HeadRate(f32),
    AmbientSegment { segment_s: u32, clip_len_s: u32 },
    AmbientGap { min_gap_s: u32, max_gap_s: u32 },
}

impl core::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            ConfigError::DeadZone(v) => {
                write!(f, "drive.dead_zone {v} outside [0, {MAX_DEAD_ZONE}]")
            }
            ConfigError::TickInterval(v) => write!(f, "drive.tick_ms must be positive, got {v}"),
            ConfigError::InputTimeout(v) => {
                write!(f, "drive.input_timeout_ms {v} shorter than one tick")
            }
            ConfigError::ServoRange(r) => write!(
                f,
                "head.range min {} / center {} / max {} is not an ordered range inside 0-180",
                r.min, r.center, r.max
            ),
            ConfigError::NudgeSpeed(v) => write!(f, "head.nudge_speed {v} outside (0, 1]"),
            ConfigError::HeadRate(v) => write!(f, "head.degrees_per_second must be positive, got {v}"),
            ConfigError::AmbientSegment {
                segment_s,
                clip_len_s,
            } => write!(
                f,
                "audio.segment_s {segment_s} longer than audio.clip_len_s {clip_len_s}"
            ),
            ConfigError::AmbientGap {
                min_gap_s,
                max_gap_s,
            } => write!(f, "audio.min_gap_s {min_gap_s} above audio.max_gap_s {max_gap_s}"),
        }
    }
}

impl DroidConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let drive = &self.drive;
        if !(0.0..=MAX_DEAD_ZONE).contains(&drive.dead_zone) {
            return Err(ConfigError::DeadZone(drive.dead_zone));
        }
        if drive.tick_ms == 0 {
            return Err(ConfigError::TickInterval(drive.tick_ms));
        }
        if drive.input_timeout_ms < drive.tick_ms {
            return Err(ConfigError::InputTimeout(drive.input_timeout_ms));
        }

        let head = &self.head;
        if !head.range.is_valid() {
            return Err(ConfigError::ServoRange(head.range));
        }
        if !(head.nudge_speed > 0.0 && head.nudge_speed <= 1.0) {
            return Err(ConfigError::NudgeSpeed(head.nudge_speed));
        }
        if !(head.degrees_per_second > 0.0 && head.degrees_per_second.is_finite()) {
            return Err(ConfigError::HeadRate(head.degrees_per_second));
        }

        let audio = &self.audio;
        if audio.segment_s > audio.clip_len_s {
            return Err(ConfigError::AmbientSegment {
                segment_s: audio.segment_s,
                clip_len_s: audio.clip_len_s,
            });
        }
        if audio.min_gap_s > audio.max_gap_s {
            return Err(ConfigError::AmbientGap {
                min_gap_s: audio.min_gap_s,
                max_gap_s: audio.max_gap_s,
            });
        }
        Ok(())
    }
}
