// Forward kinematics: observed wheel step deltas back to a pose update.

use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::units::RobotGeometry;

/// Below this angular displacement per update the motion is integrated as a
/// straight line: the arc radius `delta_d / delta_theta` blows up as
/// `delta_theta` approaches zero.
pub const TURN_EPSILON_RAD: f64 = 1e-6;

/// Robot position and heading in the odometry frame.
///
/// `theta_rad` is kept in `[0, 2π)`; [`integrate`] re-normalizes it after
/// every update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x_mm: f64,
    pub y_mm: f64,
    pub theta_rad: f64,
}

impl Pose {
    pub fn new(x_mm: f64, y_mm: f64, theta_rad: f64) -> Self {
        Self {
            x_mm,
            y_mm,
            theta_rad,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pose: x={:.2} mm, y={:.2} mm, theta={:.2}°",
            self.x_mm,
            self.y_mm,
            self.theta_rad.to_degrees()
        )
    }
}

/// Integrates one pair of wheel step deltas into a new pose.
///
/// The mean wheel displacement gives the forward travel, the displacement
/// difference over the axle length gives the heading change. Significant
/// heading change is integrated as an arc around the instantaneous center
/// of rotation; otherwise as a straight segment along the prior heading.
pub fn integrate(
    geometry: &RobotGeometry,
    pose: Pose,
    left_steps: i32,
    right_steps: i32,
) -> Pose {
    let d_left = geometry.steps_to_mm(left_steps as f64);
    let d_right = geometry.steps_to_mm(right_steps as f64);

    let delta_d = (d_left + d_right) / 2.0;
    let delta_theta = (d_right - d_left) / geometry.axle_length_mm;

    let (x_mm, y_mm) = if delta_theta.abs() > TURN_EPSILON_RAD {
        let radius = delta_d / delta_theta;
        (
            pose.x_mm + radius * ((pose.theta_rad + delta_theta).sin() - pose.theta_rad.sin()),
            pose.y_mm - radius * ((pose.theta_rad + delta_theta).cos() - pose.theta_rad.cos()),
        )
    } else {
        (
            pose.x_mm + delta_d * pose.theta_rad.cos(),
            pose.y_mm + delta_d * pose.theta_rad.sin(),
        )
    };

    Pose {
        x_mm,
        y_mm,
        theta_rad: (pose.theta_rad + delta_theta).rem_euclid(TAU),
    }
}
