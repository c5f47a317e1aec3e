use std::error::Error;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use epuck_drive::link::{RobotLink, SercomLink, SerialLink, TcpLink};
use epuck_drive::motion::{MotionIntent, Pose};
use epuck_drive::{teleop, trials, Drive, DriveConfig};

#[derive(Parser)]
#[command(name = "epuck-drive", about = "Differential-drive motion runtime")]
struct Cli {
    /// Serial port of the robot's bluetooth bridge (e.g. /dev/rfcomm0, COM16)
    #[arg(long, global = true, conflicts_with = "tcp")]
    serial: Option<String>,

    /// TCP address of the robot's wifi bridge (e.g. 172.20.10.3:1000)
    #[arg(long, global = true)]
    tcp: Option<String>,

    /// JSON file overriding calibration and loop settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive with the WASD keys, printing odometry once per second
    Teleop,

    /// Move a distance with an optional turn spread over the motion
    Move {
        /// Distance in mm; negative drives backward
        #[arg(long)]
        distance: f64,
        /// Ground speed in mm/s
        #[arg(long, default_value_t = 100.0)]
        speed: f64,
        /// Turn angle in radians over the whole move
        #[arg(long, default_value_t = 0.0)]
        omega: f64,
    },

    /// Rotate in place by an angle
    Rotate {
        /// Turn angle in radians, counter-clockwise positive
        #[arg(long)]
        angle: f64,
        /// Equivalent ground speed in mm/s
        #[arg(long, default_value_t = 100.0)]
        speed: f64,
    },

    /// Measure open-loop straight-line repeatability
    Trial {
        #[arg(long)]
        distance: f64,
        #[arg(long, default_value_t = 100.0)]
        speed: f64,
        /// Control loop frequency; defaults to the configured rate
        #[arg(long)]
        hz: Option<u32>,
        #[arg(long, default_value_t = 10)]
        trials: u32,
        /// Write outcomes as JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Connect, probe the robot, and read the step counters
    Check,
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DriveConfig::load(path)?,
        None => DriveConfig::default(),
    };

    match (&cli.serial, &cli.tcp) {
        (Some(port), None) => dispatch(SerialLink::open(port)?, config, cli.command),
        (None, Some(addr)) => dispatch(TcpLink::connect(addr)?, config, cli.command),
        _ => Err("exactly one of --serial or --tcp is required".into()),
    }
}

fn dispatch<S: Read + Write>(
    mut link: SercomLink<S>,
    config: DriveConfig,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Teleop => {
            info!("controls: WASD to drive, Q or Esc to quit");
            let pose = teleop::run(&mut link, &config, Pose::default())?;
            info!("final {}", pose);
            link.close()?;
        }
        Command::Move {
            distance,
            speed,
            omega,
        } => {
            let mut drive = Drive::new(link, config);
            let moved = drive.move_intent(MotionIntent {
                distance_mm: distance,
                speed_mm_s: speed,
                omega_rad: omega,
            })?;
            info!("moved {:.2} mm, {}", moved, drive.pose());
        }
        Command::Rotate { angle, speed } => {
            let mut drive = Drive::new(link, config);
            drive.rotate(angle, speed)?;
            info!("{}", drive.pose());
        }
        Command::Trial {
            distance,
            speed,
            hz,
            trials: runs,
            out,
        } => {
            let hz = hz.unwrap_or(config.loop_hz);
            let outcomes =
                trials::measure_trajectory(&mut link, &config, distance, speed, hz, runs)?;
            let json = serde_json::to_string_pretty(&outcomes)?;
            match out {
                Some(path) => {
                    fs::write(&path, json)?;
                    info!("wrote {} trial outcomes to {}", outcomes.len(), path.display());
                }
                None => println!("{}", json),
            }
            link.close()?;
        }
        Command::Check => {
            link.refresh_sensors()?;
            info!(
                "step counters: left={} right={}",
                link.left_step_count(),
                link.right_step_count()
            );
            link.close()?;
        }
    }
    Ok(())
}
