//! Vision heuristics that turn detections into actuator intent.
//!
//! Detection itself (faces, markers, optical flow) happens outside the core;
//! this module only decides what the head or the wheels should do about it.

use serde::Deserialize;

use super::mixing::{clamp_unit, DriveCommand};

/// Minimum mean horizontal flow (px/frame) that counts as camera motion.
pub const FLOW_THRESHOLD_PX: f32 = 0.5;

/// Axis-aligned detection box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.w as f32 / 2.0
    }

    pub fn area(&self) -> u32 {
        self.w.saturating_mul(self.h)
    }
}

/// Tuning for [`FaceTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Horizontal offset (px) tolerated before the head moves.
    pub deadband_px: f32,
    /// Frames without a face before the head starts drifting back.
    pub lost_frames: u32,
    /// Last-known offset is multiplied by this after every return step.
    pub return_decay: f32,
    /// Last-known offsets smaller than this are treated as centered.
    pub return_deadband_px: f32,
    /// Head step per decision, in degrees.
    pub step_deg: f32,
    /// `1` or `-1`; flips the mounting direction of the pan axis.
    pub direction_calibration: f32,
    /// Drive toward a fiducial marker instead of waiting for operator input.
    pub follow_marker: bool,
    /// Scales marker-derived throttle and steering.
    pub marker_max_speed: f32,
    /// Sweep the head back and forth while no face is in view.
    pub scan_when_idle: bool,
    /// Scan steps taken in one direction before reversing.
    pub scan_steps: u32,
    /// Frames between two scan steps.
    pub scan_interval_frames: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            deadband_px: 30.0,
            lost_frames: 30,
            return_decay: 0.9,
            return_deadband_px: 10.0,
            step_deg: 2.0,
            direction_calibration: 1.0,
            follow_marker: false,
            marker_max_speed: 1.0,
            scan_when_idle: false,
            scan_steps: 4,
            scan_interval_frames: 16,
        }
    }
}

/// Keeps the largest face centered by nudging the head.
///
/// Positive offsets mean the face sits right of the frame center and produce a
/// positive (rightward) nudge, before calibration and flow are applied. Once a
/// lost face has been returned to, an optional scan sweeps the head
/// `scan_steps` steps one way, then the same number back.
#[derive(Debug, Clone)]
pub struct FaceTracker {
    config: TrackingConfig,
    last_known_offset: f32,
    frames_without_face: u32,
    flow_direction: f32,
    scan_direction: f32,
    scan_count: u32,
}

impl FaceTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            last_known_offset: 0.0,
            frames_without_face: 0,
            flow_direction: 1.0,
            scan_direction: 1.0,
            scan_count: 0,
        }
    }

    pub fn last_known_offset(&self) -> f32 {
        self.last_known_offset
    }

    pub fn frames_without_face(&self) -> u32 {
        self.frames_without_face
    }

    /// Feed one frame's detections; returns a head nudge in degrees, if any.
    ///
    /// `flow_dx` is the mean horizontal displacement of tracked feature points
    /// since the previous frame; it only updates the direction estimate when it
    /// exceeds [`FLOW_THRESHOLD_PX`]. A frame without a width carries no usable
    /// geometry and is ignored.
    pub fn update(
        &mut self,
        faces: &[BoundingBox],
        frame_width: u32,
        flow_dx: Option<f32>,
    ) -> Option<f32> {
        if frame_width == 0 {
            return None;
        }
        if let Some(dx) = flow_dx.filter(|dx| libm::fabsf(*dx) > FLOW_THRESHOLD_PX) {
            self.flow_direction = if dx > 0.0 { 1.0 } else { -1.0 };
        }

        let largest = faces.iter().max_by_key(|b| b.area());
        match largest {
            Some(face) => {
                let offset = face.center_x() - frame_width as f32 / 2.0;
                self.frames_without_face = 0;
                self.last_known_offset = offset;
                self.scan_count = 0;
                if libm::fabsf(offset) > self.config.deadband_px {
                    Some(self.step_toward(offset))
                } else {
                    None
                }
            }
            None => {
                self.frames_without_face = self.frames_without_face.saturating_add(1);
                if self.frames_without_face <= self.config.lost_frames {
                    return None;
                }
                if libm::fabsf(self.last_known_offset) <= self.config.return_deadband_px {
                    return self.scan_step();
                }
                let step = self.step_toward(self.last_known_offset);
                self.last_known_offset *= self.config.return_decay;
                Some(step)
            }
        }
    }

    /// Next step of the idle sweep, paced to one every `scan_interval_frames`.
    fn scan_step(&mut self) -> Option<f32> {
        if !self.config.scan_when_idle || self.config.scan_steps == 0 {
            return None;
        }
        let idle = self.frames_without_face - self.config.lost_frames;
        if idle % self.config.scan_interval_frames.max(1) != 0 {
            return None;
        }
        if self.scan_count >= self.config.scan_steps {
            self.scan_count = 0;
            self.scan_direction = -self.scan_direction;
        }
        self.scan_count += 1;
        Some(self.config.step_deg * self.scan_direction * self.config.direction_calibration)
    }

    fn step_toward(
        &self,
        offset: f32,
    ) -> f32 {
        let sign = if offset < 0.0 { -1.0 } else { 1.0 };
        self.config.step_deg * sign * self.config.direction_calibration * self.flow_direction
    }
}

/// Steer toward a fiducial marker seen by the camera.
///
/// Steering is the horizontal offset over a quarter frame width; throttle is the
/// marker's distance above the bottom edge over half the frame height. Both are
/// clamped and scaled by `max_speed`.
pub fn marker_command(
    center: (f32, f32),
    frame_width: u32,
    frame_height: u32,
    max_speed: f32,
) -> DriveCommand {
    if frame_width == 0 || frame_height == 0 {
        return DriveCommand::STOP;
    }
    let frame_center = frame_width as f32 / 2.0;
    let frame_bottom = frame_height as f32;
    let steering = (center.0 - frame_center) / (frame_center / 2.0);
    let throttle = (frame_bottom - center.1) / (frame_bottom / 2.0);
    let scale = libm::fabsf(clamp_unit(max_speed));
    DriveCommand::new(clamp_unit(throttle) * scale, clamp_unit(steering) * scale)
}
