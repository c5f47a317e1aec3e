// Open-loop trajectory repeatability
//
// Runs the same straight move repeatedly and records the odometry error
// against the ideal end pose along the starting heading.

use std::thread::sleep;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::config::DriveConfig;
use crate::link::RobotLink;
use crate::motion::controller::StepController;
use crate::motion::kinematics::{wheel_targets, MotionIntent};
use crate::motion::odometry::{integrate, Pose};
use crate::motion::MotionError;

// Settling pause between trials.
const TRIAL_PAUSE: Duration = Duration::from_secs(2);

/// Odometry error of one trial relative to the ideal end pose.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrialOutcome {
    pub err_x_mm: f64,
    pub err_y_mm: f64,
}

/// Runs `trials` straight moves of `distance_mm` at `speed_mm_s`, with the
/// controller ticking at `loop_hz`, and returns the per-trial errors.
pub fn measure_trajectory<L: RobotLink>(
    link: &mut L,
    config: &DriveConfig,
    distance_mm: f64,
    speed_mm_s: f64,
    loop_hz: u32,
    trials: u32,
) -> Result<Vec<TrialOutcome>, MotionError> {
    let command = wheel_targets(
        &config.geometry,
        MotionIntent {
            distance_mm,
            speed_mm_s,
            omega_rad: 0.0,
        },
    )?;
    let controller = StepController::new(loop_hz).with_timeout(config.control_timeout());
    let mut outcomes = Vec::with_capacity(trials as usize);

    for trial in 0..trials {
        info!("trial {}/{} at {} Hz", trial + 1, trials, loop_hz);

        let (left_moved, right_moved) = controller.run_to_targets(link, &command)?;
        let final_pose = integrate(&config.geometry, Pose::default(), left_moved, right_moved);

        let outcome = TrialOutcome {
            err_x_mm: final_pose.x_mm - distance_mm,
            err_y_mm: final_pose.y_mm,
        };
        info!(
            "  moved ({}, {}) steps, error ({:.2}, {:.2}) mm",
            left_moved, right_moved, outcome.err_x_mm, outcome.err_y_mm
        );
        outcomes.push(outcome);

        if trial + 1 < trials {
            sleep(TRIAL_PAUSE);
        }
    }

    Ok(outcomes)
}
