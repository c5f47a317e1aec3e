// Motion runtime for a two-wheeled differential-drive robot
//
// Translates motion intents into per-wheel step targets (inverse
// kinematics), drives the wheels there through a periodic closed loop with
// per-wheel stopping, and reconstructs the pose from observed wheel-step
// deltas (odometry), over a serial or TCP robot link.

pub mod config;
pub mod drive;
pub mod link;
pub mod motion;
pub mod teleop;
pub mod trials;

pub use config::DriveConfig;
pub use drive::Drive;
pub use link::{LinkError, RobotLink, SerialLink, TcpLink};
pub use motion::{MotionError, MotionIntent, Pose, RobotGeometry, StepController, WheelCommand};
