//! HTTP Control Server
//!
//! This module defines the control panel server using the `picoserve`
//! framework. Form posts from the panel (or any HTTP client) are validated here
//! and forwarded to the hardware owners through the shared command cell and
//! channels; nothing in this module touches hardware directly.

extern crate alloc;

use alloc::{string::String, vec::Vec};

use embassy_net::Stack;
use embassy_time::{Duration, Instant};
use embedded_io_async::Write;
use picoserve::{
    extract::Form,
    response::{chunked::ChunkedResponse, Content, IntoResponse, Response, StatusCode},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::stream::VideoFeed;
use crate::utils::{
    config::DroidConfig,
    controllers::{
        control_state,
        head_angle,
        AudioCommand,
        Clip,
        ControlState,
        HeadCommand,
        ServoPosition,
        ServoRange,
        AUDIO_CHANNEL,
        COMMANDS,
        HEAD_CHANNEL,
    },
    frontend::{CSS, HTML, JAVA},
    lifecycle,
    math::mixing::DriveCommand,
};

/// Body of `/set_controls` and `/joystick`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ControlsForm {
    pub throttle: f32,
    pub steering: f32,
    pub servo_angle: Option<i32>,
}

/// Body of `/set_servo`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServoForm {
    pub servo_angle: Option<i32>,
    pub position: Option<String>,
}

/// Body of the on/off switches.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SwitchForm {
    pub state: String,
}

/// Snapshot served on `/status`.
///
/// The servo limits let the panel size its slider to the configured range.
#[derive(Debug, Serialize)]
pub struct Status {
    pub armed: bool,
    pub tracking: bool,
    pub servo_angle: Option<f32>,
    pub servo_min: f32,
    pub servo_max: f32,
    pub control: ControlState,
}

impl Status {
    pub fn current(range: ServoRange) -> Self {
        Self {
            armed: lifecycle::is_armed(),
            tracking: lifecycle::is_tracking(),
            servo_angle: head_angle(),
            servo_min: range.min,
            servo_max: range.max,
            control: control_state(),
        }
    }
}

/// Serialized JSON response body.
pub struct JsonBody(pub Vec<u8>);

impl JsonBody {
    pub fn of<T: Serialize>(value: &T) -> Self {
        // Serializing plain structs into a Vec cannot fail.
        Self(serde_json::to_vec(value).unwrap_or_default())
    }
}

impl Content for JsonBody {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn content_length(&self) -> usize {
        self.0.len()
    }

    async fn write_content<W: Write>(
        self,
        mut writer: W,
    ) -> Result<(), W::Error> {
        writer.write_all(&self.0).await
    }
}

/// Turn a controls form into a drive command.
///
/// Non-finite values are rejected rather than clamped.
pub fn controls_command(form: &ControlsForm) -> Result<DriveCommand, &'static str> {
    if !form.throttle.is_finite() || !form.steering.is_finite() {
        return Err("throttle and steering must be numbers");
    }
    Ok(DriveCommand::new(form.throttle, form.steering))
}

/// Resolve a servo form to a head command; a named position wins over an angle.
pub fn servo_command(
    form: &ServoForm,
    range: ServoRange,
) -> Result<HeadCommand, &'static str> {
    if let Some(name) = form.position.as_deref() {
        return ServoPosition::from_name(name)
            .map(HeadCommand::Position)
            .ok_or("unknown servo position");
    }
    let angle = form
        .servo_angle
        .map(|a| a as f32)
        .unwrap_or(range.center);
    Ok(HeadCommand::Angle(angle))
}

/// Switches are on only for the literal `true`.
pub fn switch_state(form: &SwitchForm) -> bool {
    form.state == "true"
}

/// Queue a head command; a full queue is reported instead of dropped silently.
pub fn send_head(command: HeadCommand) -> Result<(), &'static str> {
    HEAD_CHANNEL.try_send(command).map_err(|_| {
        tracing::warn!(?command, "head queue full, command dropped");
        "head busy"
    })
}

fn reply(
    status: StatusCode,
    message: &'static str,
) -> impl IntoResponse {
    Response::new(status, message)
}

fn handle_controls(form: ControlsForm) -> impl IntoResponse {
    let command = match controls_command(&form) {
        Ok(command) => command,
        Err(message) => {
            tracing::warn!(?form, "rejected controls");
            return reply(StatusCode::BAD_REQUEST, message);
        }
    };
    COMMANDS.publish(command, Instant::now());
    if let Some(angle) = form.servo_angle {
        if let Err(message) = send_head(HeadCommand::Angle(angle as f32)) {
            return reply(StatusCode::SERVICE_UNAVAILABLE, message);
        }
    }
    reply(StatusCode::OK, "OK")
}

/// Serves the control panel until the task is dropped.
pub async fn run(
    id: usize,
    port: u16,
    stack: Stack<'static>,
    config: &'static DroidConfig,
) -> ! {
    let server_config = picoserve::Config::new(picoserve::Timeouts {
        start_read_request: Some(Duration::from_secs(5)),
        persistent_start_read_request: None,
        read_request: Some(Duration::from_secs(1)),
        write: Some(Duration::from_secs(5)),
    });

    let range = config.head.range;

    let router = Router::new()
        .route(
            "/",
            get(|| async {
                Response::new(StatusCode::OK, HTML)
                    .with_headers([("Content-Type", "text/html; charset=utf-8")])
            }),
        )
        .route(
            "/style.css",
            get(|| async {
                Response::new(StatusCode::OK, CSS)
                    .with_headers([("Content-Type", "text/css; charset=utf-8")])
            }),
        )
        .route(
            "/script.js",
            get(|| async {
                Response::new(StatusCode::OK, JAVA)
                    .with_headers([("Content-Type", "application/javascript; charset=utf-8")])
            }),
        )
        .route(
            "/set_controls",
            post(|Form(form): Form<ControlsForm>| async move { handle_controls(form) }),
        )
        .route(
            "/joystick",
            post(|Form(form): Form<ControlsForm>| async move { handle_controls(form) }),
        )
        .route(
            "/set_servo",
            post(move |Form(form): Form<ServoForm>| async move {
                match servo_command(&form, range) {
                    Ok(command) => {
                        tracing::info!(?command, "servo request");
                        match send_head(command) {
                            Ok(()) => reply(StatusCode::OK, "OK"),
                            Err(message) => reply(StatusCode::SERVICE_UNAVAILABLE, message),
                        }
                    }
                    Err(message) => reply(StatusCode::BAD_REQUEST, message),
                }
            }),
        )
        .route(
            "/arm",
            post(|Form(form): Form<SwitchForm>| async move {
                let armed = switch_state(&form);
                lifecycle::set_armed(armed);
                let _ = AUDIO_CHANNEL.try_send(AudioCommand::Play(Clip::Armed));
                reply(StatusCode::OK, if armed { "armed" } else { "disarmed" })
            }),
        )
        .route(
            "/face_detection",
            post(|Form(form): Form<SwitchForm>| async move {
                let tracking = switch_state(&form);
                lifecycle::set_tracking(tracking);
                reply(
                    StatusCode::OK,
                    if tracking { "tracking on" } else { "tracking off" },
                )
            }),
        )
        .route(
            "/shutdown",
            post(|| async {
                if lifecycle::request_shutdown() {
                    reply(StatusCode::OK, "shutting down")
                } else {
                    reply(StatusCode::OK, "already shutting down")
                }
            }),
        )
        .route(
            "/status",
            get(move || async move {
                Response::new(StatusCode::OK, JsonBody::of(&Status::current(range)))
            }),
        )
        .route(
            "/video_feed",
            get(|| async { ChunkedResponse::new(VideoFeed) }),
        );

    if let Some(ip_cfg) = stack.config_v4() {
        tracing::info!("Starting server at {}:{}", ip_cfg.address, port);
    } else {
        tracing::warn!("Starting server on port {port}, but no IPv4 address is assigned yet!");
    }

    let (mut rx_buffer, mut tx_buffer, mut http_buffer) = ([0; 1024], [0; 4096], [0; 2048]);

    picoserve::listen_and_serve_with_state(
        id,
        &router,
        &server_config,
        stack,
        port,
        &mut rx_buffer,
        &mut tx_buffer,
        &mut http_buffer,
        &(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_reject_non_finite() {
        let form = ControlsForm {
            throttle: f32::NAN,
            ..ControlsForm::default()
        };
        assert!(controls_command(&form).is_err());
        let form = ControlsForm {
            steering: f32::INFINITY,
            ..ControlsForm::default()
        };
        assert!(controls_command(&form).is_err());
    }

    #[test]
    fn controls_clamp_out_of_range() {
        let form = ControlsForm {
            throttle: 3.0,
            steering: -0.5,
            servo_angle: None,
        };
        assert_eq!(controls_command(&form), Ok(DriveCommand::new(1.0, -0.5)));
    }

    #[test]
    fn servo_form_defaults_to_center() {
        let range = ServoRange::default();
        assert_eq!(
            servo_command(&ServoForm::default(), range),
            Ok(HeadCommand::Angle(80.0))
        );
        let form = ServoForm {
            servo_angle: Some(30),
            position: Some("right".into()),
        };
        assert_eq!(
            servo_command(&form, range),
            Ok(HeadCommand::Position(ServoPosition::Right))
        );
        let form = ServoForm {
            servo_angle: None,
            position: Some("up".into()),
        };
        assert!(servo_command(&form, range).is_err());
    }

    #[test]
    fn only_literal_true_switches_on() {
        let on = SwitchForm { state: "true".into() };
        let off = SwitchForm { state: "yes".into() };
        assert!(switch_state(&on));
        assert!(!switch_state(&off));
        assert!(!switch_state(&SwitchForm::default()));
    }

    #[test]
    fn status_serializes_as_flat_object() {
        let status = Status {
            armed: true,
            tracking: false,
            servo_angle: Some(80.0),
            servo_min: 20.0,
            servo_max: 140.0,
            control: ControlState::Idle,
        };
        let body = JsonBody::of(&status);
        assert_eq!(
            core::str::from_utf8(&body.0).unwrap(),
            r#"{"armed":true,"tracking":false,"servo_angle":80.0,"servo_min":20.0,"servo_max":140.0,"control":"idle"}"#
        );
    }

    #[test]
    fn status_carries_configured_range() {
        let range = ServoRange {
            min: 30.0,
            max: 120.0,
            center: 60.0,
        };
        let status = Status::current(range);
        assert_eq!((status.servo_min, status.servo_max), (30.0, 120.0));
    }

    #[test]
    fn full_head_queue_is_reported() {
        while send_head(HeadCommand::Center).is_ok() {}
        assert_eq!(send_head(HeadCommand::Center), Err("head busy"));
        while HEAD_CHANNEL.try_receive().is_ok() {}
        assert_eq!(send_head(HeadCommand::Center), Ok(()));
        while HEAD_CHANNEL.try_receive().is_ok() {}
    }
}
