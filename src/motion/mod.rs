// Differential-drive motion core
//
// Provides:
// - Inverse kinematics (motion intent -> per-wheel speeds and step targets)
// - Closed-loop step controller driving wheels to their targets
// - Forward kinematics / odometry (step deltas -> pose update)
// - Step/radian/millimetre unit conversions

pub mod controller;
pub mod kinematics;
pub mod odometry;
pub mod units;

use std::time::Duration;

use crate::link::LinkError;

pub use controller::StepController;
pub use kinematics::{wheel_targets, MotionIntent, WheelCommand};
pub use odometry::{integrate, Pose};
pub use units::{step_delta, RobotGeometry};

/// Error types for the motion core
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("invalid motion intent: {reason}")]
    InvalidIntent { reason: String },

    #[error("robot link failed: {0}")]
    Link(#[from] LinkError),

    #[error("step targets not reached within {elapsed:?}")]
    Timeout { elapsed: Duration },
}
