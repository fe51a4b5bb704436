//! Stick shaping and differential-drive mixing.
//!
//! Every input source (gamepad, web joystick, marker pilot) produces a
//! [`DriveCommand`] in normalized units. The drive loop shapes it with
//! [`apply_dead_zone`] and turns it into per-side [`WheelSpeeds`] with [`mix`].
//!
//! # Example
//! ```rust
//! use droid_core::utils::math::mixing::{mix, DriveCommand};
//! let shaped = DriveCommand::new(0.5, 0.3).shaped(0.2);
//! let wheels = mix(shaped.throttle, shaped.steering);
//! assert!((wheels.left - 0.5).abs() < 1e-6);
//! assert!((wheels.right - 0.25).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};

/// Largest dead zone accepted before rescaling; keeps `1 - threshold` away from zero.
pub const MAX_DEAD_ZONE: f32 = 0.95;

/// Latest operator (or autopilot) intent, both axes in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    /// Forward (+) / reverse (-).
    pub throttle: f32,
    /// Right (+) / left (-).
    pub steering: f32,
}

impl DriveCommand {
    pub const STOP: Self = Self {
        throttle: 0.0,
        steering: 0.0,
    };

    /// Build a command, clamping both axes into `[-1, 1]`.
    ///
    /// Non-finite inputs collapse to zero so a bad sample can never reach a motor.
    pub fn new(
        throttle: f32,
        steering: f32,
    ) -> Self {
        Self {
            throttle: clamp_unit(throttle),
            steering: clamp_unit(steering),
        }
    }

    /// Apply the same dead zone to both axes.
    pub fn shaped(
        self,
        dead_zone: f32,
    ) -> Self {
        Self {
            throttle: apply_dead_zone(self.throttle, dead_zone),
            steering: apply_dead_zone(self.steering, dead_zone),
        }
    }
}

/// Per-side wheel speed, both in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WheelSpeeds {
    pub left: f32,
    pub right: f32,
}

impl WheelSpeeds {
    pub const STOP: Self = Self {
        left: 0.0,
        right: 0.0,
    };

    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }

    /// Largest absolute speed across both sides.
    pub fn peak(&self) -> f32 {
        libm::fabsf(self.left).max(libm::fabsf(self.right))
    }
}

/// Clamp into `[-1, 1]`, mapping NaN and infinities to zero.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Suppress small deflections around center and rescale the rest.
///
/// Values with `|value| < threshold` become 0. Everything else is rescaled so
/// the output runs continuously from 0 at the threshold to ±1 at the extremes:
/// `(value - threshold * sign(value)) / (1 - threshold)`.
///
/// `threshold` is clamped into `[0, MAX_DEAD_ZONE]`; a threshold of 0 returns
/// the (clamped) input unchanged.
pub fn apply_dead_zone(
    value: f32,
    threshold: f32,
) -> f32 {
    let value = clamp_unit(value);
    let threshold = if threshold.is_finite() {
        threshold.clamp(0.0, MAX_DEAD_ZONE)
    } else {
        0.0
    };

    if libm::fabsf(value) < threshold {
        return 0.0;
    }
    let offset = if value > 0.0 { threshold } else { -threshold };
    clamp_unit((value - offset) / (1.0 - threshold))
}

/// Additive tank mix: `left = throttle + steering`, `right = throttle - steering`.
///
/// Each side is clamped after summing, so a saturated command loses turn
/// authority on the saturated side instead of wrapping.
pub fn mix(
    throttle: f32,
    steering: f32,
) -> WheelSpeeds {
    let throttle = clamp_unit(throttle);
    let steering = clamp_unit(steering);
    WheelSpeeds {
        left: clamp_unit(throttle + steering),
        right: clamp_unit(throttle - steering),
    }
}

/// Map a raw integer axis reading (e.g. an RC receiver channel) onto `[-1, 1]`.
///
/// A degenerate range (`max <= min`) reads as centered.
pub fn normalize_axis(
    raw: i32,
    min: i32,
    max: i32,
) -> f32 {
    if max <= min {
        return 0.0;
    }
    let unit = (raw as f32 - min as f32) / (max as f32 - min as f32);
    clamp_unit((unit - 0.5) * 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(
        a: f32,
        b: f32,
    ) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn dead_zone_suppresses_small_deflections() {
        for v in [-0.19, -0.1, 0.0, 0.05, 0.19] {
            assert_eq!(apply_dead_zone(v, 0.2), 0.0, "v = {v}");
        }
        for v in [-1.0, -0.5, -0.21, 0.21, 0.6, 1.0] {
            assert_ne!(apply_dead_zone(v, 0.2), 0.0, "v = {v}");
        }
    }

    #[test]
    fn dead_zone_is_continuous_at_threshold() {
        let t = 0.3;
        let above = apply_dead_zone(t + 1e-4, t);
        let below = apply_dead_zone(t - 1e-4, t);
        assert!(above >= 0.0 && above < 1e-3);
        assert_eq!(below, 0.0);
        let neg = apply_dead_zone(-t - 1e-4, t);
        assert!(neg <= 0.0 && neg > -1e-3);
    }

    #[test]
    fn dead_zone_keeps_extremes_and_sign() {
        assert!(close(apply_dead_zone(1.0, 0.2), 1.0));
        assert!(close(apply_dead_zone(-1.0, 0.2), -1.0));
        assert!(apply_dead_zone(-0.6, 0.2) < 0.0);
    }

    #[test]
    fn zero_threshold_is_identity() {
        for v in [-1.0, -0.42, 0.0, 0.13, 1.0] {
            assert!(close(apply_dead_zone(v, 0.0), v));
        }
    }

    #[test]
    fn threshold_of_one_never_divides_by_zero() {
        let out = apply_dead_zone(1.0, 1.0);
        assert!(out.is_finite());
        assert!((-1.0..=1.0).contains(&out));
        assert_eq!(apply_dead_zone(0.9, 1.0), 0.0);
    }

    #[test]
    fn mix_reference_points() {
        assert_eq!(mix(1.0, 0.0), WheelSpeeds { left: 1.0, right: 1.0 });
        assert_eq!(mix(0.0, 1.0), WheelSpeeds { left: 1.0, right: -1.0 });
        assert_eq!(mix(1.0, 1.0), WheelSpeeds { left: 1.0, right: 0.0 });
        assert_eq!(mix(-1.0, -1.0), WheelSpeeds { left: -1.0, right: 0.0 });
    }

    #[test]
    fn mix_stays_in_range() {
        let steps = [-1.0, -0.75, -0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0];
        for &t in &steps {
            for &s in &steps {
                let w = mix(t, s);
                assert!((-1.0..=1.0).contains(&w.left), "t={t} s={s}");
                assert!((-1.0..=1.0).contains(&w.right), "t={t} s={s}");
            }
        }
    }

    #[test]
    fn shaped_then_mixed_scenario() {
        let shaped = DriveCommand::new(0.5, 0.3).shaped(0.2);
        assert!(close(shaped.throttle, 0.375));
        assert!(close(shaped.steering, 0.125));
        let w = mix(shaped.throttle, shaped.steering);
        assert!(close(w.left, 0.5));
        assert!(close(w.right, 0.25));
    }

    #[test]
    fn command_rejects_non_finite() {
        let cmd = DriveCommand::new(f32::NAN, f32::INFINITY);
        assert_eq!(cmd, DriveCommand::STOP);
        assert_eq!(DriveCommand::new(3.0, -2.0), DriveCommand::new(1.0, -1.0));
    }

    #[test]
    fn normalize_axis_maps_receiver_range() {
        assert!(close(normalize_axis(0, 0, 2048), -1.0));
        assert!(close(normalize_axis(1024, 0, 2048), 0.0));
        assert!(close(normalize_axis(2048, 0, 2048), 1.0));
        assert_eq!(normalize_axis(5, 10, 10), 0.0);
    }
}
