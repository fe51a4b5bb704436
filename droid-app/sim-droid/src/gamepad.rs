//! Gamepad input via `gilrs`.
//!
//! Left stick drives, right stick pans the head. A centred pad stays silent so
//! it does not fight the web joystick; unplugging it drops the held command.

use std::{thread, time::Duration};

use droid_core::utils::{
    controllers::{HeadCommand, COMMANDS, HEAD_CHANNEL},
    lifecycle,
    math::mixing::DriveCommand,
};
use embassy_time::Instant;
use gilrs::{Axis, EventType, Gilrs};

const POLL: Duration = Duration::from_millis(10);
/// Head nudges are sent at most every this many polls.
const HEAD_EVERY: u32 = 10;
const HEAD_STEP_DEG: f32 = 2.0;
const HEAD_STICK_THRESHOLD: f32 = 0.5;

fn poll() {
    let mut gilrs = match Gilrs::new() {
        Ok(gilrs) => gilrs,
        Err(error) => {
            tracing::warn!(%error, "gamepad support unavailable");
            return;
        }
    };
    let mut last = DriveCommand::STOP;
    let mut ticks = 0u32;

    while lifecycle::is_running() {
        while let Some(event) = gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    tracing::info!(name = gilrs.gamepad(event.id).name(), "gamepad connected");
                }
                EventType::Disconnected => {
                    tracing::warn!("gamepad disconnected, clearing drive command");
                    COMMANDS.clear();
                    last = DriveCommand::STOP;
                }
                _ => {}
            }
        }

        if let Some((_, pad)) = gilrs.gamepads().next() {
            let command = DriveCommand::new(pad.value(Axis::LeftStickY), pad.value(Axis::LeftStickX));
            if command != DriveCommand::STOP || last != DriveCommand::STOP {
                COMMANDS.publish(command, Instant::now());
            }
            last = command;

            let pan = pad.value(Axis::RightStickX);
            ticks = ticks.wrapping_add(1);
            if pan.abs() > HEAD_STICK_THRESHOLD && ticks % HEAD_EVERY == 0 {
                let _ = HEAD_CHANNEL.try_send(HeadCommand::Nudge(HEAD_STEP_DEG * pan.signum()));
            }
        }

        thread::sleep(POLL);
    }
}

/// Start polling on its own thread; missing gamepad support is not fatal.
pub fn spawn() {
    if let Err(error) = thread::Builder::new().name("gamepad".into()).spawn(poll) {
        tracing::warn!(%error, "failed to start gamepad thread");
    }
}
