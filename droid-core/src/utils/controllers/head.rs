//! Head pan owner task.
//!
//! All head motion goes through [`HEAD_CHANNEL`], so exactly one task ever
//! writes the head's PWM line. The actuator behind it is fixed at startup: a
//! position servo, or a DC motor that emulates one by timed nudges.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Timer};

use super::{
    actuator::{Actuator, ActuatorKind},
    servo::{ServoPosition, ServoRange},
};
use crate::utils::{
    config::HeadConfig,
    lifecycle::{self, Owner},
};

/// Channel used to receive head commands (`HeadCommand` messages).
pub static HEAD_CHANNEL: Channel<CriticalSectionRawMutex, HeadCommand, 8> = Channel::new();

/// How often an idle head task re-checks the run flag.
const IDLE_POLL: Duration = Duration::from_millis(200);

/// Last angle reached by the head, as `f32` bits; `u32::MAX` means unknown.
static HEAD_ANGLE: AtomicU32 = AtomicU32::new(u32::MAX);

/// Last commanded head angle, if the head has moved since startup.
pub fn head_angle() -> Option<f32> {
    match HEAD_ANGLE.load(Ordering::Relaxed) {
        u32::MAX => None,
        bits => Some(f32::from_bits(bits)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadCommand {
    /// Absolute angle in degrees; clamped to the safe range.
    Angle(f32),
    Position(ServoPosition),
    /// Relative move in degrees from the current angle.
    Nudge(f32),
    Center,
    /// Center, release, and stop the task.
    Park,
}

/// Owner of the head actuator.
pub struct HeadController<A> {
    actuator: A,
    config: HeadConfig,
    angle: Option<f32>,
}

impl<A: Actuator> HeadController<A> {
    pub fn new(
        actuator: A,
        config: HeadConfig,
    ) -> Self {
        Self {
            actuator,
            config,
            angle: None,
        }
    }

    pub fn angle(&self) -> Option<f32> {
        self.angle
    }

    fn range(&self) -> ServoRange {
        self.config.range
    }

    /// Resolve a command to an absolute, clamped target angle.
    pub fn target_for(
        &self,
        command: HeadCommand,
    ) -> f32 {
        let range = self.range();
        let target = match command {
            HeadCommand::Angle(a) => a,
            HeadCommand::Position(p) => range.position(p),
            HeadCommand::Nudge(delta) => self.angle.unwrap_or(range.center) + delta,
            HeadCommand::Center | HeadCommand::Park => range.center,
        };
        range.clamp(target)
    }

    /// Move to `angle`; redundant targets are skipped entirely.
    pub async fn move_to(
        &mut self,
        angle: f32,
    ) -> Result<(), A::Error> {
        let angle = self.range().clamp(angle);
        if self.angle == Some(angle) {
            return Ok(());
        }

        match self.actuator.kind() {
            ActuatorKind::PositionServo => {
                let target = if self.config.invert {
                    self.range().max + self.range().min - angle
                } else {
                    angle
                };
                self.actuator.set_target(target)?;
                Timer::after_millis(self.config.settle_ms).await;
                if self.config.release_after_settle {
                    self.actuator.release()?;
                }
            }
            ActuatorKind::ContinuousMotor => {
                let from = self.angle.unwrap_or(self.range().center);
                let delta = angle - from;
                let direction = if delta < 0.0 { -1.0 } else { 1.0 };
                let direction = if self.config.invert { -direction } else { direction };
                let secs = libm::fabsf(delta) / self.config.degrees_per_second;
                self.actuator
                    .set_target(direction * self.config.nudge_speed)?;
                Timer::after_millis(libm::roundf(secs * 1000.0) as u64).await;
                self.actuator.rest()?;
            }
        }

        self.angle = Some(angle);
        HEAD_ANGLE.store(angle.to_bits(), Ordering::Relaxed);
        tracing::debug!(angle, "head moved");
        Ok(())
    }

    /// Center, drop any holding signal, and report the head parked.
    pub async fn park(&mut self) {
        let center = self.range().center;
        if let Err(error) = self.move_to(center).await {
            tracing::error!(?error, "failed to center head");
        }
        // A servo is already centered by `move_to`, mirrored if inverted; its
        // `rest` would write the raw center and undo that.
        if self.actuator.kind() == ActuatorKind::ContinuousMotor {
            if let Err(error) = self.actuator.rest() {
                tracing::error!(?error, "failed to rest head");
            }
        }
        if let Err(error) = self.actuator.release() {
            tracing::error!(?error, "failed to release head");
        }
        tracing::info!("head parked");
        lifecycle::report_parked(Owner::Head);
    }

    /// Serve `HEAD_CHANNEL` until shutdown, then park.
    pub async fn run(&mut self) {
        tracing::info!(kind = ?self.actuator.kind(), "head controller started");
        let center = self.range().center;
        if let Err(error) = self.move_to(center).await {
            tracing::error!(?error, "failed to center head at startup");
        }

        while lifecycle::is_running() {
            let command = match select(HEAD_CHANNEL.receive(), Timer::after(IDLE_POLL)).await {
                Either::First(command) => command,
                Either::Second(()) => continue,
            };
            if command == HeadCommand::Park {
                break;
            }
            let angle = self.target_for(command);
            if let Err(error) = self.move_to(angle).await {
                tracing::error!(?error, ?command, "head command failed");
            }
        }
        self.park().await;
    }
}
