//! Differential drive: latest-command cell, control loop, and the drive owner task.
//!
//! Input sources publish into [`COMMANDS`]; only [`DriveController`] touches the
//! wheel motors. Every tick re-reads the whole command, so left and right are
//! always derived from the same throttle/steering pair.

use core::{
    cell::Cell,
    sync::atomic::{AtomicBool, Ordering},
};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Duration, Instant, Ticker};
use serde::Serialize;

use super::{
    actuator::Actuator,
    audio::{AudioCommand, Clip, AUDIO_CHANNEL},
};
use crate::utils::{
    config::DriveConfig,
    lifecycle::{self, Owner},
    math::mixing::{mix, DriveCommand, WheelSpeeds},
};

/// Latest command shared by every input source.
pub static COMMANDS: CommandCell = CommandCell::new();

static DRIVE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// State of the drive loop as of its last tick.
pub fn control_state() -> ControlState {
    if DRIVE_ACTIVE.load(Ordering::Relaxed) {
        ControlState::Active
    } else {
        ControlState::Idle
    }
}

/// A command together with the time it was received.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedCommand {
    pub command: DriveCommand,
    pub at: Instant,
}

/// Mutex-guarded "most recent write wins" slot.
pub struct CommandCell {
    inner: Mutex<CriticalSectionRawMutex, Cell<Option<StampedCommand>>>,
}

impl CommandCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(None)),
        }
    }

    pub fn publish(
        &self,
        command: DriveCommand,
        at: Instant,
    ) {
        self.inner
            .lock(|cell| cell.set(Some(StampedCommand { command, at })));
    }

    pub fn latest(&self) -> Option<StampedCommand> {
        self.inner.lock(|cell| cell.get())
    }

    pub fn clear(&self) {
        self.inner.lock(|cell| cell.set(None));
    }
}

impl Default for CommandCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the loop is currently applying operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    Idle,
    Active,
}

/// Pure control step: command in, wheel speeds out.
#[derive(Debug, Clone)]
pub struct ControlLoop {
    dead_zone: f32,
    input_timeout: Duration,
    state: ControlState,
}

impl ControlLoop {
    pub fn new(config: &DriveConfig) -> Self {
        Self {
            dead_zone: config.dead_zone,
            input_timeout: Duration::from_millis(config.input_timeout_ms),
            state: ControlState::Idle,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Compute this tick's wheel speeds.
    ///
    /// Disarmed, never-commanded, or stale input yields [`WheelSpeeds::STOP`].
    pub fn tick(
        &mut self,
        now: Instant,
        latest: Option<StampedCommand>,
        armed: bool,
    ) -> WheelSpeeds {
        let fresh = latest.filter(|c| now.saturating_duration_since(c.at) <= self.input_timeout);

        let next = match (armed, fresh) {
            (true, Some(stamped)) => {
                let shaped = stamped.command.shaped(self.dead_zone);
                (ControlState::Active, mix(shaped.throttle, shaped.steering))
            }
            _ => (ControlState::Idle, WheelSpeeds::STOP),
        };

        if next.0 != self.state {
            match next.0 {
                ControlState::Active => tracing::info!("drive active"),
                ControlState::Idle if !armed => tracing::info!("drive idle: disarmed"),
                ControlState::Idle => tracing::warn!("drive idle: input silent, stopping"),
            }
            self.state = next.0;
        }
        next.1
    }
}

/// Left and right motors of the drive base.
pub struct DriveTrain<M> {
    left: M,
    right: M,
    swap_sides: bool,
}

impl<M: Actuator> DriveTrain<M> {
    pub fn new(
        left: M,
        right: M,
        swap_sides: bool,
    ) -> Self {
        Self {
            left,
            right,
            swap_sides,
        }
    }

    /// Write both sides; the second side is still written if the first fails.
    pub fn apply(
        &mut self,
        speeds: WheelSpeeds,
    ) -> Result<(), M::Error> {
        let (left, right) = if self.swap_sides {
            (speeds.right, speeds.left)
        } else {
            (speeds.left, speeds.right)
        };
        let l = self.left.set_target(left);
        let r = self.right.set_target(right);
        l.and(r)
    }

    pub fn stop(&mut self) -> Result<(), M::Error> {
        let l = self.left.rest();
        let r = self.right.rest();
        l.and(r)
    }
}

/// Owner of the drive motors.
pub struct DriveController<M> {
    drive: DriveTrain<M>,
    control: ControlLoop,
    tick: Duration,
    alert_threshold: f32,
    alerting: bool,
}

impl<M: Actuator> DriveController<M> {
    pub fn new(
        drive: DriveTrain<M>,
        config: &DriveConfig,
    ) -> Self {
        Self {
            drive,
            control: ControlLoop::new(config),
            tick: Duration::from_millis(config.tick_ms),
            alert_threshold: config.alert_threshold,
            alerting: false,
        }
    }

    /// Run one control tick against the shared command cell.
    pub fn step(
        &mut self,
        now: Instant,
    ) -> WheelSpeeds {
        let speeds = self
            .control
            .tick(now, COMMANDS.latest(), lifecycle::is_armed());
        DRIVE_ACTIVE.store(
            self.control.state() == ControlState::Active,
            Ordering::Relaxed,
        );
        if let Err(error) = self.drive.apply(speeds) {
            tracing::error!(?error, "drive write failed");
        }

        let alerting = speeds.peak() > self.alert_threshold;
        if alerting && !self.alerting {
            // Fire and forget: a full audio queue just skips the squeal.
            let _ = AUDIO_CHANNEL.try_send(AudioCommand::Play(Clip::Alert));
        }
        self.alerting = alerting;
        speeds
    }

    /// Tick until shutdown, then stop both motors and report parked.
    pub async fn run(&mut self) {
        tracing::info!(tick_ms = self.tick.as_millis(), "drive loop started");
        let mut ticker = Ticker::every(self.tick);
        while lifecycle::is_running() {
            self.step(Instant::now());
            ticker.next().await;
        }

        DRIVE_ACTIVE.store(false, Ordering::Relaxed);
        if let Err(error) = self.drive.stop() {
            tracing::error!(?error, "failed to stop drive motors");
        }
        tracing::info!("drive motors stopped");
        lifecycle::report_parked(Owner::Drive);
    }
}
