//! Spektrum RC receiver input via `evdev`.
//!
//! The receiver enumerates as a USB joystick: throttle on `ABS_Y`, steering on
//! `ABS_X`, head pan on `ABS_RZ`. Raw readings are normalized against the range
//! each axis reports. As with the gamepad, centred sticks stay silent.

use std::{thread, time::Duration as StdDuration};

use droid_core::utils::{
    controllers::{HeadCommand, COMMANDS, HEAD_CHANNEL},
    lifecycle,
    math::mixing::{normalize_axis, DriveCommand},
};
use embassy_time::{Duration, Instant};
use evdev::{AbsoluteAxisType, Device, EventType};

pub const SPEKTRUM_VENDOR_ID: u16 = 0x0483;
pub const SPEKTRUM_PRODUCT_ID: u16 = 0x572b;

const HEAD_STEP_DEG: f32 = 2.0;
const HEAD_STICK_THRESHOLD: f32 = 0.5;
/// The receiver streams every frame; head nudges are rate limited.
const HEAD_INTERVAL: Duration = Duration::from_millis(100);
const RETRY: StdDuration = StdDuration::from_secs(2);

/// Raw range of one receiver channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn normalize(
        &self,
        raw: i32,
    ) -> f32 {
        normalize_axis(raw, self.min, self.max)
    }
}

/// What one receiver event asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    Drive(DriveCommand),
    Head(HeadCommand),
}

/// Latest stick positions of the receiver.
#[derive(Debug, Clone)]
pub struct Sticks {
    throttle: AxisRange,
    steering: AxisRange,
    pan: AxisRange,
    command: DriveCommand,
    last_nudge: Option<Instant>,
}

impl Sticks {
    pub fn new(
        throttle: AxisRange,
        steering: AxisRange,
        pan: AxisRange,
    ) -> Self {
        Self {
            throttle,
            steering,
            pan,
            command: DriveCommand::STOP,
            last_nudge: None,
        }
    }

    /// Fold one absolute-axis event in; returns what to publish, if anything.
    pub fn on_axis(
        &mut self,
        code: u16,
        raw: i32,
        now: Instant,
    ) -> Option<Input> {
        let previous = self.command;
        if code == AbsoluteAxisType::ABS_Y.0 {
            self.command = DriveCommand::new(self.throttle.normalize(raw), previous.steering);
        } else if code == AbsoluteAxisType::ABS_X.0 {
            self.command = DriveCommand::new(previous.throttle, self.steering.normalize(raw));
        } else if code == AbsoluteAxisType::ABS_RZ.0 {
            return self.pan(raw, now);
        } else {
            return None;
        }

        if self.command != DriveCommand::STOP || previous != DriveCommand::STOP {
            Some(Input::Drive(self.command))
        } else {
            None
        }
    }

    fn pan(
        &mut self,
        raw: i32,
        now: Instant,
    ) -> Option<Input> {
        let pan = self.pan.normalize(raw);
        if pan.abs() <= HEAD_STICK_THRESHOLD {
            return None;
        }
        if self
            .last_nudge
            .is_some_and(|at| now.saturating_duration_since(at) < HEAD_INTERVAL)
        {
            return None;
        }
        self.last_nudge = Some(now);
        Some(Input::Head(HeadCommand::Nudge(HEAD_STEP_DEG * pan.signum())))
    }
}

fn find_receiver() -> Option<Device> {
    evdev::enumerate()
        .map(|(_, device)| device)
        .find(|device| {
            let id = device.input_id();
            id.vendor() == SPEKTRUM_VENDOR_ID && id.product() == SPEKTRUM_PRODUCT_ID
        })
}

fn sticks_for(device: &Device) -> std::io::Result<Sticks> {
    let abs = device.get_abs_state()?;
    let range = |axis: AbsoluteAxisType| {
        let info = &abs[axis.0 as usize];
        AxisRange {
            min: info.minimum,
            max: info.maximum,
        }
    };
    Ok(Sticks::new(
        range(AbsoluteAxisType::ABS_Y),
        range(AbsoluteAxisType::ABS_X),
        range(AbsoluteAxisType::ABS_RZ),
    ))
}

/// Read one receiver until it fails or shutdown begins.
fn serve(mut device: Device) -> std::io::Result<()> {
    let mut sticks = sticks_for(&device)?;
    tracing::info!(name = device.name().unwrap_or("receiver"), "rc receiver connected");

    while lifecycle::is_running() {
        for event in device.fetch_events()? {
            if event.event_type() != EventType::ABSOLUTE {
                continue;
            }
            match sticks.on_axis(event.code(), event.value(), Instant::now()) {
                Some(Input::Drive(command)) => COMMANDS.publish(command, Instant::now()),
                Some(Input::Head(command)) => {
                    if HEAD_CHANNEL.try_send(command).is_err() {
                        tracing::trace!("head queue full, dropping receiver nudge");
                    }
                }
                None => {}
            }
        }
    }
    Ok(())
}

fn poll() {
    while lifecycle::is_running() {
        match find_receiver() {
            Some(device) => {
                if let Err(error) = serve(device) {
                    tracing::warn!(%error, "rc receiver lost, clearing drive command");
                    COMMANDS.clear();
                }
            }
            None => tracing::debug!("no rc receiver found"),
        }
        thread::sleep(RETRY);
    }
}

/// Start reading the receiver on its own thread; a missing receiver is not fatal.
pub fn spawn() {
    if let Err(error) = thread::Builder::new().name("rc-receiver".into()).spawn(poll) {
        tracing::warn!(%error, "failed to start rc receiver thread");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEKTRUM: AxisRange = AxisRange { min: 0, max: 2048 };

    fn sticks() -> Sticks {
        Sticks::new(SPEKTRUM, SPEKTRUM, SPEKTRUM)
    }

    #[test]
    fn raw_axes_become_drive_commands() {
        let mut s = sticks();
        let now = Instant::from_millis(0);
        assert_eq!(
            s.on_axis(AbsoluteAxisType::ABS_Y.0, 2048, now),
            Some(Input::Drive(DriveCommand::new(1.0, 0.0)))
        );
        assert_eq!(
            s.on_axis(AbsoluteAxisType::ABS_X.0, 0, now),
            Some(Input::Drive(DriveCommand::new(1.0, -1.0)))
        );
    }

    #[test]
    fn centred_sticks_stay_silent_after_one_stop() {
        let mut s = sticks();
        let now = Instant::from_millis(0);
        assert_eq!(s.on_axis(AbsoluteAxisType::ABS_Y.0, 1024, now), None);
        s.on_axis(AbsoluteAxisType::ABS_Y.0, 1536, now);
        assert_eq!(
            s.on_axis(AbsoluteAxisType::ABS_Y.0, 1024, now),
            Some(Input::Drive(DriveCommand::STOP))
        );
        assert_eq!(s.on_axis(AbsoluteAxisType::ABS_Y.0, 1024, now), None);
        assert_eq!(s.on_axis(AbsoluteAxisType::ABS_Z.0, 0, now), None);
    }

    #[test]
    fn pan_nudges_are_rate_limited() {
        let mut s = sticks();
        let nudge = |s: &mut Sticks, raw, ms| {
            s.on_axis(AbsoluteAxisType::ABS_RZ.0, raw, Instant::from_millis(ms))
        };
        assert_eq!(nudge(&mut s, 1200, 0), None);
        assert_eq!(nudge(&mut s, 2048, 0), Some(Input::Head(HeadCommand::Nudge(2.0))));
        assert_eq!(nudge(&mut s, 2048, 50), None);
        assert_eq!(nudge(&mut s, 0, 120), Some(Input::Head(HeadCommand::Nudge(-2.0))));
    }
}
