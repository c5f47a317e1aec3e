// High-level drive API
//
// Combines inverse kinematics, the step controller, and odometry over a
// robot link, tracking the robot's pose across moves.

use tracing::{info, warn};

use crate::config::DriveConfig;
use crate::link::RobotLink;
use crate::motion::controller::StepController;
use crate::motion::kinematics::{wheel_targets, MotionIntent, WheelCommand};
use crate::motion::odometry::{integrate, Pose};
use crate::motion::MotionError;

/// Exclusive owner of one robot's link; only one control loop can ever be
/// driving a robot, and owning the link makes a second one unrepresentable.
pub struct Drive<L: RobotLink> {
    link: L,
    config: DriveConfig,
    pose: Pose,
}

impl<L: RobotLink> Drive<L> {
    pub fn new(link: L, config: DriveConfig) -> Self {
        Self::with_pose(link, config, Pose::default())
    }

    pub fn with_pose(link: L, config: DriveConfig, pose: Pose) -> Self {
        Self { link, config, pose }
    }

    /// Pose accumulated from wheel odometry since construction.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn controller(&self) -> StepController {
        StepController::new(self.config.loop_hz).with_timeout(self.config.control_timeout())
    }

    /// Executes a motion intent and returns the mean ground distance the
    /// wheels actually covered, in mm.
    pub fn move_intent(&mut self, intent: MotionIntent) -> Result<f64, MotionError> {
        let command = wheel_targets(&self.config.geometry, intent)?;
        info!(
            "moving: {:.1} mm at {:.1} mm/s, turn {:.3} rad",
            intent.distance_mm, intent.speed_mm_s, intent.omega_rad
        );
        let (left_moved, right_moved) = self.move_steps(&command)?;
        let mean_steps = f64::from(left_moved + right_moved) / 2.0;
        Ok(self.config.geometry.steps_to_mm(mean_steps))
    }

    /// Straight-line move; negative distance drives backward.
    pub fn move_straight(&mut self, distance_mm: f64, speed_mm_s: f64) -> Result<f64, MotionError> {
        self.move_intent(MotionIntent {
            distance_mm,
            speed_mm_s: if distance_mm < 0.0 {
                -speed_mm_s.abs()
            } else {
                speed_mm_s
            },
            omega_rad: 0.0,
        })
    }

    /// Rotation in place by `omega_rad`.
    pub fn rotate(&mut self, omega_rad: f64, speed_mm_s: f64) -> Result<f64, MotionError> {
        self.move_intent(MotionIntent {
            distance_mm: 0.0,
            speed_mm_s,
            omega_rad,
        })
    }

    /// Raw wheel-step move, bypassing kinematics; still feeds odometry.
    pub fn move_steps(&mut self, command: &WheelCommand) -> Result<(i32, i32), MotionError> {
        let moved = self.controller().run_to_targets(&mut self.link, command)?;
        self.pose = integrate(&self.config.geometry, self.pose, moved.0, moved.1);
        Ok(moved)
    }
}

impl<L: RobotLink> Drop for Drive<L> {
    fn drop(&mut self) {
        // Never leave the robot commanded to move.
        if let Err(e) = self.link.stop_all() {
            warn!("failed to stop robot on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::link::SimulatedLink;

    fn fast_config() -> DriveConfig {
        DriveConfig {
            loop_hz: 1000,
            ..DriveConfig::default()
        }
    }

    #[test]
    fn test_move_straight_tracks_pose() {
        let mut drive = Drive::new(SimulatedLink::new(8, 8), fast_config());

        let moved_mm = drive.move_straight(100.0, 50.0).unwrap();

        // Overshoot is at most one tick of simulated travel.
        assert!((moved_mm - 100.0).abs() < 2.0, "moved {} mm", moved_mm);
        let pose = drive.pose();
        assert_relative_eq!(pose.x_mm, moved_mm, epsilon = 1e-9);
        assert_eq!(pose.y_mm, 0.0);
        assert_eq!(pose.theta_rad, 0.0);
    }

    #[test]
    fn test_move_backward_tracks_pose() {
        let mut drive = Drive::new(SimulatedLink::new(8, 8), fast_config());

        let moved_mm = drive.move_straight(-50.0, 50.0).unwrap();

        assert!(moved_mm < 0.0);
        assert!((moved_mm + 50.0).abs() < 2.0, "moved {} mm", moved_mm);
        assert!(drive.pose().x_mm < 0.0);
    }

    #[test]
    fn test_rotate_pivots_without_drift() {
        let mut drive = Drive::new(SimulatedLink::new(5, 5), fast_config());

        drive.rotate(std::f64::consts::FRAC_PI_2, 50.0).unwrap();

        let pose = drive.pose();
        assert_eq!(pose.x_mm, 0.0);
        assert_eq!(pose.y_mm, 0.0);
        assert!(pose.theta_rad > 0.0);
    }

    #[test]
    fn test_invalid_intent_is_surfaced() {
        let mut drive = Drive::new(SimulatedLink::new(5, 5), fast_config());

        let err = drive
            .move_intent(MotionIntent {
                distance_mm: 100.0,
                speed_mm_s: 0.0,
                omega_rad: 0.0,
            })
            .unwrap_err();

        assert!(matches!(err, MotionError::InvalidIntent { .. }));
    }
}
