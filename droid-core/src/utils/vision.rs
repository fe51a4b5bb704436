//! Detection boundary.
//!
//! Frames and detections come from a camera collaborator outside the core:
//! JPEG bytes go to [`FRAMES`] for the video feed, and per-frame detections go
//! to [`DETECTIONS`]. The [`Autopilot`] turns detections into head nudges and,
//! when configured, marker-following drive commands.

extern crate alloc;

use alloc::{sync::Arc, vec::Vec};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, watch::Watch};
use embassy_time::{with_timeout, Duration, Instant};
use serde::Deserialize;

use crate::utils::{
    controllers::{HeadCommand, COMMANDS, HEAD_CHANNEL},
    lifecycle,
    math::tracking::{marker_command, BoundingBox, FaceTracker, TrackingConfig},
};

/// Latest encoded JPEG frame; each video client holds one receiver.
pub static FRAMES: Watch<CriticalSectionRawMutex, Arc<[u8]>, 4> = Watch::new();

/// Per-frame detections from the camera collaborator.
pub static DETECTIONS: Channel<CriticalSectionRawMutex, Detections, 4> = Channel::new();

const POLL: Duration = Duration::from_millis(200);

/// What the vision collaborator found in one frame.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Detections {
    pub frame_width: u32,
    pub frame_height: u32,
    pub faces: Vec<BoundingBox>,
    /// Centre of the fiducial marker, in pixels.
    pub marker: Option<(f32, f32)>,
    /// Mean horizontal optical flow since the previous frame.
    pub flow_dx: Option<f32>,
}

/// Head tracking and marker following.
pub struct Autopilot {
    tracker: FaceTracker,
    config: TrackingConfig,
}

impl Autopilot {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            tracker: FaceTracker::new(config),
            config,
        }
    }

    /// React to one frame of detections.
    pub fn handle(
        &mut self,
        detections: &Detections,
        now: Instant,
    ) {
        if lifecycle::is_tracking() {
            let nudge =
                self.tracker
                    .update(&detections.faces, detections.frame_width, detections.flow_dx);
            if let Some(delta) = nudge {
                tracing::trace!(delta, "tracking nudge");
                let _ = HEAD_CHANNEL.try_send(HeadCommand::Nudge(delta));
            }
        }

        if self.config.follow_marker {
            if let Some(center) = detections.marker {
                let command = marker_command(
                    center,
                    detections.frame_width,
                    detections.frame_height,
                    self.config.marker_max_speed,
                );
                COMMANDS.publish(command, now);
            }
        }
    }

    pub async fn run(&mut self) {
        tracing::info!(follow_marker = self.config.follow_marker, "autopilot started");
        while lifecycle::is_running() {
            if let Ok(detections) = with_timeout(POLL, DETECTIONS.receive()).await {
                self.handle(&detections, Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_json_with_missing_fields() {
        let d: Detections = serde_json::from_str(
            r#"{"frame_width":640,"frame_height":480,"faces":[{"x":10,"y":20,"w":30,"h":40}]}"#,
        )
        .unwrap();
        assert_eq!(d.faces.len(), 1);
        assert_eq!(d.faces[0].w, 30);
        assert_eq!(d.marker, None);
        assert_eq!(d.flow_dx, None);

        let d: Detections =
            serde_json::from_str(r#"{"frame_width":640,"frame_height":480,"marker":[320.0,100.0]}"#)
                .unwrap();
        assert!(d.faces.is_empty());
        assert_eq!(d.marker, Some((320.0, 100.0)));
    }
}
