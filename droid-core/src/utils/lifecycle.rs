//! Run flag, operator switches, and the ordered shutdown sequence.
//!
//! Owner tasks poll [`is_running`] and, once it drops, bring their hardware to
//! a safe state and say so on [`PARKED`]. The shutdown task waits on
//! [`SHUTDOWN`] and then runs [`shutdown_sequence`].

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use embassy_time::{with_timeout, Duration};

use crate::utils::controllers::{AudioCommand, HeadCommand, AUDIO_CHANNEL, HEAD_CHANNEL};

static RUNNING: AtomicBool = AtomicBool::new(true);
static ARMED: AtomicBool = AtomicBool::new(false);
static TRACKING: AtomicBool = AtomicBool::new(false);

/// Raised once when shutdown is requested.
pub static SHUTDOWN: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Owners report here after leaving their hardware safe.
pub static PARKED: Channel<CriticalSectionRawMutex, Owner, 4> = Channel::new();

/// Tasks that own a piece of hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Drive,
    Head,
    Audio,
}

pub fn is_running() -> bool {
    RUNNING.load(Ordering::Acquire)
}

pub fn is_armed() -> bool {
    ARMED.load(Ordering::Relaxed)
}

pub fn set_armed(armed: bool) {
    if ARMED.swap(armed, Ordering::Relaxed) != armed {
        tracing::info!(armed, "arm state changed");
    }
}

pub fn is_tracking() -> bool {
    TRACKING.load(Ordering::Relaxed)
}

pub fn set_tracking(tracking: bool) {
    if TRACKING.swap(tracking, Ordering::Relaxed) != tracking {
        tracing::info!(tracking, "head tracking changed");
    }
}

pub fn report_parked(owner: Owner) {
    if PARKED.try_send(owner).is_err() {
        tracing::warn!(?owner, "parked queue full");
    }
}

/// Begin shutdown. Safe to call repeatedly and from any thread.
///
/// Returns `false` if shutdown was already underway.
pub fn request_shutdown() -> bool {
    if !RUNNING.swap(false, Ordering::AcqRel) {
        return false;
    }
    tracing::info!("shutdown requested");
    ARMED.store(false, Ordering::Relaxed);
    TRACKING.store(false, Ordering::Relaxed);
    // The head task may be idle in `receive`; a full queue still parks on its next poll.
    let _ = HEAD_CHANNEL.try_send(HeadCommand::Park);
    SHUTDOWN.signal(());
    true
}

/// What the shutdown sequence managed to confirm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub drive_parked: bool,
    pub head_parked: bool,
    pub farewell_played: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.drive_parked && self.head_parked && self.farewell_played
    }

    fn record(
        &mut self,
        owner: Owner,
    ) {
        match owner {
            Owner::Drive => self.drive_parked = true,
            Owner::Head => self.head_parked = true,
            Owner::Audio => self.farewell_played = true,
        }
    }
}

/// Wait for the motors and head to park, then play the farewell clip.
///
/// Each step is bounded by `step_timeout`; a step that runs out is logged and
/// the sequence moves on.
pub async fn shutdown_sequence(step_timeout: Duration) -> ShutdownReport {
    let mut report = ShutdownReport::default();

    let actuators = with_timeout(step_timeout, async {
        while !(report.drive_parked && report.head_parked) {
            report.record(PARKED.receive().await);
        }
    })
    .await;
    if actuators.is_err() {
        tracing::error!(
            drive = report.drive_parked,
            head = report.head_parked,
            "actuators did not park in time"
        );
    }

    if AUDIO_CHANNEL.try_send(AudioCommand::Farewell).is_err() {
        tracing::warn!("audio queue full, skipping farewell");
    } else {
        let farewell = with_timeout(step_timeout, async {
            while !report.farewell_played {
                report.record(PARKED.receive().await);
            }
        })
        .await;
        if farewell.is_err() {
            tracing::warn!("farewell clip did not finish in time");
        }
    }

    tracing::info!(?report, "shutdown sequence finished");
    report
}
