// Robot link abstraction
//
// The motion core talks to the robot through this trait: commanded wheel
// speeds go out, raw step counter readings come back. Concrete transports
// live in `sercom` (serial or TCP); tests drive the core against
// `SimulatedLink`.

pub mod sercom;

use tracing::warn;

pub use sercom::{SerialLink, SercomLink, TcpLink};

/// Error types for robot communication
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response from robot: {reason}")]
    InvalidResponse { reason: String },
}

/// Minimal capability the motion core needs from a robot connection.
///
/// Commanded speeds are staged with [`set_commanded_speeds`] and take
/// effect on the next [`send_command`]. Step counters are cached locally
/// and only change on [`refresh_sensors`]; they are raw wrapping values,
/// compare them through [`crate::motion::step_delta`].
///
/// [`set_commanded_speeds`]: RobotLink::set_commanded_speeds
/// [`send_command`]: RobotLink::send_command
/// [`refresh_sensors`]: RobotLink::refresh_sensors
pub trait RobotLink {
    /// Stages desired wheel speeds in steps per second.
    fn set_commanded_speeds(&mut self, left_steps_s: i32, right_steps_s: i32);

    /// Transmits the currently staged speeds to the robot.
    fn send_command(&mut self) -> Result<(), LinkError>;

    /// Blocks until the locally cached sensor readings are updated.
    fn refresh_sensors(&mut self) -> Result<(), LinkError>;

    /// Most recently refreshed left step counter.
    fn left_step_count(&self) -> i32;

    /// Most recently refreshed right step counter.
    fn right_step_count(&self) -> i32;

    /// Commands zero speed on both wheels and transmits immediately.
    fn stop_all(&mut self) -> Result<(), LinkError>;
}

/// Stops the robot without letting a second failure mask the first.
///
/// Leaving motors running on an aborted control loop is the real hazard, so
/// every error path tries this before propagating.
pub(crate) fn stop_best_effort<L: RobotLink>(link: &mut L) {
    if let Err(e) = link.stop_all() {
        warn!("failed to stop robot while handling an earlier error: {}", e);
    }
}

#[cfg(test)]
pub(crate) use simulated::SimulatedLink;

#[cfg(test)]
mod simulated {
    use super::{LinkError, RobotLink};
    use crate::motion::units::MAX_STEP_COUNT;

    /// In-memory robot: each sensor refresh advances the wrapping step
    /// counters by a fixed rate in the direction of the commanded speed.
    pub(crate) struct SimulatedLink {
        left_cmd: i32,
        right_cmd: i32,
        raw_left: i32,
        raw_right: i32,
        left_rate: i32,
        right_rate: i32,
        refreshes: usize,
        pub sends: usize,
        pub stops: usize,
        /// When set, sensor refreshes past this count fail.
        pub fail_after_refreshes: Option<usize>,
    }

    impl SimulatedLink {
        pub fn new(left_rate: i32, right_rate: i32) -> Self {
            Self {
                left_cmd: 0,
                right_cmd: 0,
                raw_left: 0,
                raw_right: 0,
                left_rate,
                right_rate,
                refreshes: 0,
                sends: 0,
                stops: 0,
                fail_after_refreshes: None,
            }
        }

        /// Starts the raw counters at given values (for wraparound tests).
        pub fn with_start(mut self, left: i32, right: i32) -> Self {
            self.raw_left = left;
            self.raw_right = right;
            self
        }

        pub fn commanded(&self) -> (i32, i32) {
            (self.left_cmd, self.right_cmd)
        }

        fn wrap(raw: i32) -> i32 {
            raw.rem_euclid(MAX_STEP_COUNT)
        }
    }

    impl RobotLink for SimulatedLink {
        fn set_commanded_speeds(&mut self, left_steps_s: i32, right_steps_s: i32) {
            self.left_cmd = left_steps_s;
            self.right_cmd = right_steps_s;
        }

        fn send_command(&mut self) -> Result<(), LinkError> {
            self.sends += 1;
            Ok(())
        }

        fn refresh_sensors(&mut self) -> Result<(), LinkError> {
            self.refreshes += 1;
            if let Some(limit) = self.fail_after_refreshes {
                if self.refreshes > limit {
                    return Err(LinkError::InvalidResponse {
                        reason: "simulated link failure".to_string(),
                    });
                }
            }
            self.raw_left = Self::wrap(self.raw_left + self.left_rate * self.left_cmd.signum());
            self.raw_right = Self::wrap(self.raw_right + self.right_rate * self.right_cmd.signum());
            Ok(())
        }

        fn left_step_count(&self) -> i32 {
            self.raw_left
        }

        fn right_step_count(&self) -> i32 {
            self.raw_right
        }

        fn stop_all(&mut self) -> Result<(), LinkError> {
            self.stops += 1;
            self.left_cmd = 0;
            self.right_cmd = 0;
            Ok(())
        }
    }
}
