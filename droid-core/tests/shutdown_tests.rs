//! Owner tasks against mocked hardware, ending in shutdown.
//!
//! The run flag and the shared channels are process globals and shutdown cannot
//! be undone, so everything here runs as one ordered scenario in its own test
//! binary.

use droid_core::utils::{
    config::{DriveConfig, HeadConfig},
    controllers::{
        control_state,
        AudioCommand,
        Clip,
        ControlState,
        DriveController,
        DriveTrain,
        HeadCommand,
        HeadController,
        Motor,
        Servo,
        AUDIO_CHANNEL,
        COMMANDS,
        HEAD_CHANNEL,
    },
    lifecycle::{self, shutdown_sequence, ShutdownReport},
    math::mixing::{DriveCommand, WheelSpeeds},
};
use embassy_time::{Duration, Instant};
use embedded_hal_mock::eh1::{
    digital::{Mock as PinMock, State as PinState, Transaction as PinTrans},
    pwm::{Mock as PwmMock, Transaction as PwmTrans},
};

const MAX_DUTY: u16 = 1000;
const SERVO_MAX_DUTY: u16 = 20_000;

type MockMotor = Motor<PinMock, PinMock, PwmMock>;

struct MotorMocks {
    in1: PinMock,
    in2: PinMock,
    en: PwmMock,
}

impl MotorMocks {
    /// Expect one write per transition, `true` meaning full forward and
    /// `false` a stop.
    fn expecting(transitions: &[bool]) -> Self {
        let (mut in1, mut in2, mut en) = (Vec::new(), Vec::new(), Vec::new());
        for &forward in transitions {
            if forward {
                in2.push(PinTrans::set(PinState::Low));
                in1.push(PinTrans::set(PinState::High));
                en.push(PwmTrans::max_duty_cycle(MAX_DUTY));
                en.push(PwmTrans::set_duty_cycle(MAX_DUTY));
            } else {
                en.push(PwmTrans::set_duty_cycle(0));
                in1.push(PinTrans::set(PinState::Low));
                in2.push(PinTrans::set(PinState::Low));
            }
        }
        Self {
            in1: PinMock::new(&in1),
            in2: PinMock::new(&in2),
            en: PwmMock::new(&en),
        }
    }

    fn motor(&self) -> MockMotor {
        Motor::new(self.in1.clone(), self.in2.clone(), self.en.clone())
    }

    fn done(&mut self) {
        self.in1.done();
        self.in2.done();
        self.en.done();
    }
}

fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

#[test]
fn test_owners_follow_commands_then_park_on_shutdown() {
    // Disarmed stop, forward, silence stop, forward, shutdown stop.
    let transitions = [false, true, false, true, false];
    let mut left = MotorMocks::expecting(&transitions);
    let mut right = MotorMocks::expecting(&transitions);
    let config = DriveConfig::default();
    let mut drive = DriveController::new(DriveTrain::new(left.motor(), right.motor(), false), &config);

    // Disarmed: a fresh command moves nothing.
    COMMANDS.publish(DriveCommand::new(1.0, 0.0), at(1_000));
    assert_eq!(drive.step(at(1_000)), WheelSpeeds::STOP);

    // Armed: full forward, one squeal on the rising edge only.
    lifecycle::set_armed(true);
    assert_eq!(drive.step(at(1_000)), WheelSpeeds { left: 1.0, right: 1.0 });
    assert_eq!(control_state(), ControlState::Active);
    drive.step(at(1_050));
    assert_eq!(AUDIO_CHANNEL.try_receive().ok(), Some(AudioCommand::Play(Clip::Alert)));
    assert!(AUDIO_CHANNEL.try_receive().is_err());

    // Input goes silent past the timeout: both sides stop.
    assert_eq!(drive.step(at(1_600)), WheelSpeeds::STOP);
    assert_eq!(control_state(), ControlState::Idle);

    // Head follows its channel and returns to center on Park.
    let expectations = [
        // startup center at 80
        PwmTrans::max_duty_cycle(SERVO_MAX_DUTY),
        PwmTrans::set_duty_cycle(1389),
        PwmTrans::set_duty_cycle(0),
        // commanded 100
        PwmTrans::max_duty_cycle(SERVO_MAX_DUTY),
        PwmTrans::set_duty_cycle(1611),
        PwmTrans::set_duty_cycle(0),
        // park back at 80
        PwmTrans::max_duty_cycle(SERVO_MAX_DUTY),
        PwmTrans::set_duty_cycle(1389),
        PwmTrans::set_duty_cycle(0),
    ];
    let mut pwm = PwmMock::new(&expectations);
    let head_config = HeadConfig {
        settle_ms: 1,
        ..HeadConfig::default()
    };
    let mut head = HeadController::new(Servo::new(pwm.clone(), head_config.range), head_config);
    HEAD_CHANNEL.try_send(HeadCommand::Angle(100.0)).unwrap();
    HEAD_CHANNEL.try_send(HeadCommand::Park).unwrap();
    embassy_futures::block_on(head.run());
    assert_eq!(head.angle(), Some(80.0));
    pwm.done();

    // Moving again when shutdown lands: the drive loop exits and stops the motors.
    COMMANDS.publish(DriveCommand::new(1.0, 0.0), at(2_000));
    drive.step(at(2_000));
    assert!(lifecycle::request_shutdown());
    assert!(!lifecycle::is_running());
    assert!(!lifecycle::is_armed());
    embassy_futures::block_on(drive.run());
    assert_eq!(control_state(), ControlState::Idle);
    left.done();
    right.done();

    // Both owners reported; nothing plays the farewell here, so that step times out.
    let report = embassy_futures::block_on(shutdown_sequence(Duration::from_millis(20)));
    assert_eq!(
        report,
        ShutdownReport {
            drive_parked: true,
            head_parked: true,
            farewell_played: false,
        }
    );
    assert!(!report.is_clean());
    assert_eq!(AUDIO_CHANNEL.try_receive().ok(), Some(AudioCommand::Play(Clip::Alert)));
    assert_eq!(AUDIO_CHANNEL.try_receive().ok(), Some(AudioCommand::Farewell));
}
