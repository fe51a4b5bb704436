use droid_core::utils::{
    config::HeadConfig,
    controllers::{DriveTrain, HeadController, Motor, Servo, ServoRange},
    math::mixing::{mix, WheelSpeeds},
};
use embedded_hal_mock::eh1::{
    digital::{Mock as PinMock, State as PinState, Transaction as PinTrans},
    pwm::{Mock as PwmMock, Transaction as PwmTrans},
};

/// Full-scale duty reported by the mocked PWM channels.
pub const MAX_DUTY: u16 = 1000;
/// Full-scale duty of a 50 Hz servo channel with microsecond resolution.
pub const SERVO_MAX_DUTY: u16 = 20_000;

fn high() -> PinTrans {
    PinTrans::set(PinState::High)
}

fn low() -> PinTrans {
    PinTrans::set(PinState::Low)
}

/// Expect one duty write, preceded by the full-scale query.
fn duty(value: u16) -> [PwmTrans; 2] {
    [
        PwmTrans::max_duty_cycle(MAX_DUTY),
        PwmTrans::set_duty_cycle(value),
    ]
}

struct MotorMocks {
    in1: PinMock,
    in2: PinMock,
    en: PwmMock,
}

impl MotorMocks {
    fn new(
        in1: &[PinTrans],
        in2: &[PinTrans],
        en: &[PwmTrans],
    ) -> Self {
        Self {
            in1: PinMock::new(in1),
            in2: PinMock::new(in2),
            en: PwmMock::new(en),
        }
    }

    fn motor(&self) -> Motor<PinMock, PinMock, PwmMock> {
        Motor::new(self.in1.clone(), self.in2.clone(), self.en.clone())
    }

    fn done(&mut self) {
        self.in1.done();
        self.in2.done();
        self.en.done();
    }
}

#[test]
fn test_motor_forward_then_stop() {
    let mut mocks = MotorMocks::new(&[high(), low()], &[low(), low()], &{
        let mut en = duty(500).to_vec();
        en.push(PwmTrans::set_duty_cycle(0));
        en
    });
    let mut motor = mocks.motor();

    motor.drive(0.5).unwrap();
    // Same state again: no writes.
    motor.drive(0.5).unwrap();
    motor.stop().unwrap();
    motor.stop().unwrap();

    mocks.done();
}

#[test]
fn test_motor_backward() {
    let mut mocks = MotorMocks::new(&[low()], &[high()], &duty(250));
    let mut motor = mocks.motor();

    motor.drive(-0.25).unwrap();

    mocks.done();
}

#[test]
fn test_motor_direction_change_rewrites_pins() {
    let mut en = duty(1000).to_vec();
    en.extend(duty(300));
    let mut mocks = MotorMocks::new(&[high(), low()], &[low(), high()], &en);
    let mut motor = mocks.motor();

    motor.drive(2.0).unwrap();
    motor.drive(-0.3).unwrap();

    mocks.done();
}

#[test]
fn test_inverted_motor_flips_direction() {
    let mut mocks = MotorMocks::new(&[low()], &[high()], &duty(500));
    let mut motor = mocks.motor().with_inverted(true);

    motor.drive(0.5).unwrap();

    mocks.done();
}

#[test]
fn test_drive_train_spin_in_place() {
    let mut left = MotorMocks::new(&[high()], &[low()], &duty(1000));
    let mut right = MotorMocks::new(&[low()], &[high()], &duty(1000));
    let mut train = DriveTrain::new(left.motor(), right.motor(), false);

    let speeds = mix(0.0, 1.0);
    assert_eq!(
        speeds,
        WheelSpeeds {
            left: 1.0,
            right: -1.0
        }
    );
    train.apply(speeds).unwrap();

    left.done();
    right.done();
}

#[test]
fn test_servo_skips_repeated_angle() {
    let expectations = [
        PwmTrans::max_duty_cycle(SERVO_MAX_DUTY),
        PwmTrans::set_duty_cycle(1500),
        PwmTrans::set_duty_cycle(0),
        PwmTrans::max_duty_cycle(SERVO_MAX_DUTY),
        PwmTrans::set_duty_cycle(2056),
    ];
    let mut pwm = PwmMock::new(&expectations);
    let mut servo = Servo::new(pwm.clone(), ServoRange::default());

    assert!(servo.set_angle(90.0).unwrap());
    assert!(!servo.set_angle(90.0).unwrap());
    servo.release().unwrap();
    servo.release().unwrap();
    // Clamped to the top of the safe range.
    assert!(servo.set_angle(200.0).unwrap());
    assert_eq!(servo.last_angle(), Some(140.0));

    pwm.done();
}

#[test]
fn test_head_servo_settles_and_releases() {
    let expectations = [
        PwmTrans::max_duty_cycle(SERVO_MAX_DUTY),
        PwmTrans::set_duty_cycle(1611),
        PwmTrans::set_duty_cycle(0),
    ];
    let mut pwm = PwmMock::new(&expectations);
    let config = HeadConfig {
        settle_ms: 1,
        ..HeadConfig::default()
    };
    let mut head = HeadController::new(Servo::new(pwm.clone(), config.range), config);

    embassy_futures::block_on(async {
        head.move_to(100.0).await.unwrap();
        head.move_to(100.0).await.unwrap();
    });
    assert_eq!(head.angle(), Some(100.0));

    pwm.done();
}

#[test]
fn test_inverted_head_parks_at_mirrored_center() {
    // Center 60 is off the midpoint, so the mirrored write (100) differs from
    // the raw one (60, duty 1167), which must never reach the line.
    let expectations = [
        PwmTrans::max_duty_cycle(SERVO_MAX_DUTY),
        PwmTrans::set_duty_cycle(1611),
        PwmTrans::set_duty_cycle(0),
    ];
    let mut pwm = PwmMock::new(&expectations);
    let config = HeadConfig {
        range: ServoRange {
            min: 20.0,
            max: 140.0,
            center: 60.0,
        },
        settle_ms: 1,
        release_after_settle: false,
        invert: true,
        ..HeadConfig::default()
    };
    let mut head = HeadController::new(Servo::new(pwm.clone(), config.range), config);

    embassy_futures::block_on(async {
        head.move_to(60.0).await.unwrap();
        head.park().await;
    });
    assert_eq!(head.angle(), Some(60.0));

    pwm.done();
}
