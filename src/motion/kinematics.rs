// Differential-drive inverse kinematics.
//
// Maps a motion intent (distance, signed speed, turn angle) to per-wheel
// speeds and step targets. The two wheels trace concentric arcs around the
// instantaneous center of rotation; the turning effort splits between them
// as opposite-signed offsets of half the axle length.

use serde::{Deserialize, Serialize};

use super::units::RobotGeometry;
use super::MotionError;

/// A single motion request: how far, how fast, how much turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionIntent {
    /// Straight-line distance to cover. Zero requests a rotation in place.
    pub distance_mm: f64,
    /// Ground speed; negative drives backward.
    pub speed_mm_s: f64,
    /// Turn angle over the whole motion, counter-clockwise positive.
    pub omega_rad: f64,
}

/// Per-wheel speeds and step targets for one motion.
///
/// Targets are non-negative magnitudes; direction is carried by the sign of
/// the corresponding speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelCommand {
    pub left_speed: i32,
    pub right_speed: i32,
    pub left_target: i32,
    pub right_target: i32,
}

impl WheelCommand {
    /// Same speed and target on both wheels.
    pub fn straight(speed_steps_s: i32, target_steps: i32) -> Self {
        Self {
            left_speed: speed_steps_s,
            right_speed: speed_steps_s,
            left_target: target_steps,
            right_target: target_steps,
        }
    }
}

/// Computes per-wheel speeds (steps/s) and step targets for an intent.
///
/// A zero `speed_mm_s` is rejected: with a nonzero distance the travel time
/// is unbounded, and with a zero distance the wheels would be commanded to
/// hold still while nonzero targets never complete.
pub fn wheel_targets(
    geometry: &RobotGeometry,
    intent: MotionIntent,
) -> Result<WheelCommand, MotionError> {
    if intent.speed_mm_s == 0.0 {
        return Err(MotionError::InvalidIntent {
            reason: format!("zero speed for a {} mm move", intent.distance_mm),
        });
    }

    let half_axle = geometry.half_axle_mm();

    let (left_speed_mm, right_speed_mm, left_distance_mm, right_distance_mm);
    if intent.distance_mm == 0.0 {
        // Rotation in place: the wheels counter-rotate, each covering an
        // arc of half-axle radius over the turn angle.
        let angular_velocity = intent.speed_mm_s.abs() / half_axle;
        left_speed_mm = -angular_velocity * half_axle;
        right_speed_mm = angular_velocity * half_axle;
        left_distance_mm = -intent.omega_rad * half_axle;
        right_distance_mm = intent.omega_rad * half_axle;
    } else {
        // Translation with an optional turn spread over the travel time.
        let time_s = (intent.distance_mm / intent.speed_mm_s).abs();
        let angular_velocity = intent.omega_rad / time_s;
        left_speed_mm = intent.speed_mm_s - angular_velocity * half_axle;
        right_speed_mm = intent.speed_mm_s + angular_velocity * half_axle;
        left_distance_mm = intent.distance_mm - intent.omega_rad * half_axle;
        right_distance_mm = intent.distance_mm + intent.omega_rad * half_axle;
    }

    Ok(WheelCommand {
        left_speed: geometry.mm_to_steps(left_speed_mm),
        right_speed: geometry.mm_to_steps(right_speed_mm),
        left_target: geometry.mm_to_steps(left_distance_mm).abs(),
        right_target: geometry.mm_to_steps(right_distance_mm).abs(),
    })
}
