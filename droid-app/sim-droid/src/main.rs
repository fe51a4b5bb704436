mod audio;
mod camera;
#[cfg(feature = "gamepad")]
mod gamepad;
mod hardware;
#[cfg(feature = "rc")]
mod receiver;

use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use droid_core::{
    mk_static,
    utils::{
        config::DroidConfig,
        controllers::{
            ActuatorKind,
            Chatter,
            DriveController,
            DriveTrain,
            HeadController,
            Motor,
            Servo,
        },
        http,
        lifecycle::{self, shutdown_sequence, SHUTDOWN},
        vision::Autopilot,
    },
};
use embassy_executor::{Executor, Spawner};
use embassy_net::{Config, Ipv4Address, Ipv4Cidr, Runner, Stack, StackResources};
use embassy_net_tuntap::TunTapDevice;
use embassy_time::Duration;
use heapless::Vec;
use rand_core::{OsRng, TryRngCore, UnwrapErr};
use static_cell::StaticCell;
use tracing::{error, info, warn};

use crate::{
    audio::{ClipPaths, Mpg123},
    camera::DirCamera,
    hardware::{LoggedPin, LoggedPwm},
};

/// Concurrent HTTP connections; the video feed holds one for as long as it is open.
const WEB_TASK_POOL_SIZE: usize = 4;
/// Full-scale duty of the simulated motor enable lines.
const MOTOR_MAX_DUTY: u16 = 1000;
/// 50 Hz servo period in microseconds.
const SERVO_MAX_DUTY: u16 = 20_000;

type DriveMotor = Motor<LoggedPin, LoggedPin, LoggedPwm>;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// TAP device name
    #[clap(long, default_value = "tap0")]
    tap: String,
    /// use a static IP instead of DHCP
    #[clap(long)]
    static_ip: bool,
    /// HTTP port of the control panel
    #[clap(long, default_value_t = 5000)]
    port: u16,
    /// JSON configuration file; built-in defaults when omitted
    #[clap(long)]
    config: Option<PathBuf>,
    /// directory of `*.jpg` frames (with optional `*.json` detections) to replay
    #[clap(long, default_value = "frames")]
    frames: PathBuf,
    /// frame rate of the replayed camera
    #[clap(long, default_value_t = 15)]
    fps: u32,
    /// directory holding ambient.mp3, shutdown.mp3, alert.mp3 and armed.mp3
    #[clap(long, default_value = "sounds")]
    sounds: PathBuf,
    /// ALSA device passed to mpg123, e.g. `hw:1,0`
    #[clap(long)]
    audio_device: Option<String>,
    /// drive the head with a DC motor instead of a servo
    #[clap(long)]
    head_motor: bool,
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, TunTapDevice>) -> ! {
    runner.run().await
}

#[embassy_executor::task(pool_size = WEB_TASK_POOL_SIZE)]
async fn web_task(
    id: usize,
    port: u16,
    stack: Stack<'static>,
    config: &'static DroidConfig,
) -> ! {
    http(id, port, stack, config).await
}

#[embassy_executor::task]
async fn drive_task(mut ctrl: DriveController<DriveMotor>) {
    ctrl.run().await
}

#[embassy_executor::task]
async fn head_servo_task(mut ctrl: HeadController<Servo<LoggedPwm>>) {
    ctrl.run().await
}

#[embassy_executor::task]
async fn head_motor_task(mut ctrl: HeadController<DriveMotor>) {
    ctrl.run().await
}

#[embassy_executor::task]
async fn audio_task(
    player: Mpg123,
    farewell_limit: Duration,
) -> ! {
    audio::run(player, farewell_limit).await
}

#[embassy_executor::task]
async fn chatter_task(mut chatter: Chatter<UnwrapErr<OsRng>>) {
    chatter.run().await
}

#[embassy_executor::task]
async fn autopilot_task(mut autopilot: Autopilot) {
    autopilot.run().await
}

#[embassy_executor::task]
async fn shutdown_task(step_timeout: Duration) {
    SHUTDOWN.wait().await;
    let report = shutdown_sequence(step_timeout).await;
    if report.is_clean() {
        info!("shutdown complete");
    } else {
        warn!(?report, "shutdown finished with steps timed out");
    }
    std::process::exit(0);
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DroidConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DroidConfig::default(),
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn drive_motor(
    forward: &'static str,
    backward: &'static str,
    enable: &'static str,
    inverted: bool,
) -> DriveMotor {
    Motor::new(
        LoggedPin::new(forward),
        LoggedPin::new(backward),
        LoggedPwm::new(enable, MOTOR_MAX_DUTY),
    )
    .with_inverted(inverted)
}

fn spawn_all(
    spawner: Spawner,
    opts: &Opts,
    config: &'static DroidConfig,
    stack: Stack<'static>,
    runner: Runner<'static, TunTapDevice>,
) {
    spawner.must_spawn(net_task(runner));
    spawner.must_spawn(shutdown_task(Duration::from_millis(
        config.shutdown.step_timeout_ms,
    )));

    let drive = DriveTrain::new(
        drive_motor("GPIO23", "GPIO22", "PWM13", config.drive.invert_left),
        drive_motor("GPIO17", "GPIO27", "PWM12", config.drive.invert_right),
        config.drive.swap_sides,
    );
    spawner.must_spawn(drive_task(DriveController::new(drive, &config.drive)));

    let mut head = config.head;
    if opts.head_motor {
        head.actuator = ActuatorKind::ContinuousMotor;
    }
    match head.actuator {
        ActuatorKind::PositionServo => {
            let servo = Servo::new(LoggedPwm::new("PWM18", SERVO_MAX_DUTY), head.range);
            spawner.must_spawn(head_servo_task(HeadController::new(servo, head)));
        }
        ActuatorKind::ContinuousMotor => {
            let motor = drive_motor("GPIO5", "GPIO6", "PWM26", false);
            spawner.must_spawn(head_motor_task(HeadController::new(motor, head)));
        }
    }

    let player = Mpg123::new(opts.audio_device.clone(), ClipPaths::in_dir(&opts.sounds));
    spawner.must_spawn(audio_task(
        player,
        Duration::from_millis(config.shutdown.step_timeout_ms),
    ));
    spawner.must_spawn(chatter_task(Chatter::new(OsRng.unwrap_err(), config.audio)));
    spawner.must_spawn(autopilot_task(Autopilot::new(config.tracking)));

    for id in 0..WEB_TASK_POOL_SIZE {
        spawner.must_spawn(web_task(id, opts.port, stack, config));
    }
    info!(port = opts.port, "control panel tasks started");
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let config: &'static DroidConfig = mk_static!(DroidConfig, load_config(opts.config.as_ref())?);

    let camera = DirCamera::open(&opts.frames, opts.fps).context("opening camera")?;
    info!(frames = camera.len(), "camera ready");

    ctrlc::set_handler(|| {
        if !lifecycle::request_shutdown() {
            error!("second interrupt, exiting without cleanup");
            std::process::exit(130);
        }
    })
    .context("installing signal handler")?;

    // Network
    let device = TunTapDevice::new(&opts.tap)
        .with_context(|| format!("opening TAP device {}", opts.tap))?;
    let net_config = if opts.static_ip {
        Config::ipv4_static(embassy_net::StaticConfigV4 {
            address: Ipv4Cidr::new(Ipv4Address::new(192, 168, 69, 2), 24),
            dns_servers: Vec::new(),
            gateway: Some(Ipv4Address::new(192, 168, 69, 1)),
        })
    } else {
        Config::dhcpv4(Default::default())
    };
    let seed = OsRng.try_next_u64().context("seeding network stack")?;
    let (stack, runner) = embassy_net::new(
        device,
        net_config,
        mk_static!(StackResources<6>, StackResources::<6>::new()),
        seed,
    );

    camera.spawn().context("starting camera thread")?;
    #[cfg(feature = "gamepad")]
    gamepad::spawn();
    #[cfg(feature = "rc")]
    receiver::spawn();

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| spawn_all(spawner, &opts, config, stack, runner))
}
