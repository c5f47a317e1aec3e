// Closed-loop step controller
//
// Drives both wheels toward per-wheel step targets, polling the step
// counters at a fixed rate and zeroing each wheel's commanded speed
// independently once its target magnitude is reached.

use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::link::{stop_best_effort, RobotLink};

use super::kinematics::WheelCommand;
use super::units::step_delta;
use super::MotionError;

/// Periodic controller running one wheel-step move to completion.
///
/// The caller's command is never mutated; a wheel whose target is reached
/// gets its speed overridden to zero in the controller's working copy only.
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    loop_hz: u32,
    timeout: Option<Duration>,
}

impl StepController {
    pub fn new(loop_hz: u32) -> Self {
        Self {
            loop_hz,
            timeout: None,
        }
    }

    /// Deadline for the whole move. On expiry the robot is stopped and the
    /// move fails with [`MotionError::Timeout`]. Without one the controller
    /// blocks until both targets are reached, however long that takes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs the wheels until both step targets are reached.
    ///
    /// Transmits the commanded speeds, refreshes the sensors once, and
    /// captures the baseline from that fresh reading before the first
    /// sleep. Each tick then refreshes the sensors, accumulates the
    /// wraparound-corrected step deltas, zeroes any wheel whose moved
    /// magnitude has reached its target, and re-sends the command. The
    /// robot is always stopped on the way out, success or not.
    ///
    /// Returns the observed `(left, right)` steps moved; overshoot is
    /// bounded by one tick of travel per wheel.
    pub fn run_to_targets<L: RobotLink>(
        &self,
        link: &mut L,
        command: &WheelCommand,
    ) -> Result<(i32, i32), MotionError> {
        let period = Duration::from_secs_f64(1.0 / f64::from(self.loop_hz));
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);

        let mut left_speed = command.left_speed;
        let mut right_speed = command.right_speed;

        debug!(
            "step controller: speeds ({}, {}) steps/s, targets ({}, {}) steps at {} Hz",
            left_speed, right_speed, command.left_target, command.right_target, self.loop_hz
        );

        link.set_commanded_speeds(left_speed, right_speed);
        if let Err(e) = link.send_command() {
            stop_best_effort(link);
            return Err(e.into());
        }
        if let Err(e) = link.refresh_sensors() {
            stop_best_effort(link);
            return Err(e.into());
        }
        let mut left_last = link.left_step_count();
        let mut right_last = link.right_step_count();
        let mut left_moved: i32 = 0;
        let mut right_moved: i32 = 0;

        while left_moved.abs() < command.left_target || right_moved.abs() < command.right_target {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    stop_best_effort(link);
                    let elapsed = started.elapsed();
                    warn!(
                        "step controller timed out after {:?} at ({}, {}) of ({}, {}) steps",
                        elapsed, left_moved, right_moved, command.left_target, command.right_target
                    );
                    return Err(MotionError::Timeout { elapsed });
                }
            }

            sleep(period);

            if let Err(e) = link.refresh_sensors() {
                stop_best_effort(link);
                return Err(e.into());
            }
            let left_current = link.left_step_count();
            let right_current = link.right_step_count();
            left_moved += step_delta(left_last, left_current);
            right_moved += step_delta(right_last, right_current);
            left_last = left_current;
            right_last = right_current;

            if left_moved.abs() >= command.left_target {
                left_speed = 0;
            }
            if right_moved.abs() >= command.right_target {
                right_speed = 0;
            }

            link.set_commanded_speeds(left_speed, right_speed);
            if let Err(e) = link.send_command() {
                stop_best_effort(link);
                return Err(e.into());
            }
        }

        link.stop_all()?;
        info!("step targets reached: moved ({}, {}) steps", left_moved, right_moved);
        Ok((left_moved, right_moved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimulatedLink;

    // Fast ticks so the tests finish in milliseconds.
    const TEST_HZ: u32 = 1000;

    fn controller() -> StepController {
        StepController::new(TEST_HZ).with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_reaches_targets_and_stops_once() {
        let mut link = SimulatedLink::new(5, 5);
        let command = WheelCommand::straight(500, 50);

        let (left, right) = controller().run_to_targets(&mut link, &command).unwrap();

        assert_eq!(left, 50);
        assert_eq!(right, 50);
        assert_eq!(link.stops, 1);
        assert_eq!(link.commanded(), (0, 0));
    }

    #[test]
    fn test_wheels_stop_independently() {
        // Left runs twice as fast; it must be halted while the right wheel
        // keeps going, without overshooting its own target.
        let mut link = SimulatedLink::new(10, 5);
        let command = WheelCommand::straight(500, 50);

        let (left, right) = controller().run_to_targets(&mut link, &command).unwrap();

        assert_eq!(left, 50);
        assert_eq!(right, 50);
        assert_eq!(link.stops, 1);
    }

    #[test]
    fn test_backward_motion_counts_magnitudes() {
        let mut link = SimulatedLink::new(5, 5);
        let command = WheelCommand::straight(-500, 50);

        let (left, right) = controller().run_to_targets(&mut link, &command).unwrap();

        assert_eq!(left, -50);
        assert_eq!(right, -50);
    }

    #[test]
    fn test_counter_wraparound_mid_move() {
        let mut link = SimulatedLink::new(5, 5).with_start(32760, 32760);
        let command = WheelCommand::straight(500, 100);

        let (left, right) = controller().run_to_targets(&mut link, &command).unwrap();

        assert_eq!(left, 100);
        assert_eq!(right, 100);
    }

    #[test]
    fn test_zero_targets_complete_immediately() {
        let mut link = SimulatedLink::new(5, 5);
        let command = WheelCommand::straight(500, 0);

        let moved = controller().run_to_targets(&mut link, &command).unwrap();

        assert_eq!(moved, (0, 0));
        assert_eq!(link.stops, 1);
        // Only the initial transmission happened before the loop exited.
        assert_eq!(link.sends, 1);
    }

    #[test]
    fn test_timeout_stops_robot() {
        // Stalled wheels: counters never advance.
        let mut link = SimulatedLink::new(0, 0);
        let command = WheelCommand::straight(500, 100);
        let controller = StepController::new(TEST_HZ).with_timeout(Duration::from_millis(50));

        let err = controller.run_to_targets(&mut link, &command).unwrap_err();

        assert!(matches!(err, MotionError::Timeout { .. }));
        assert_eq!(link.stops, 1);
        assert_eq!(link.commanded(), (0, 0));
    }

    #[test]
    fn test_link_failure_still_stops_robot() {
        let mut link = SimulatedLink::new(1, 1);
        link.fail_after_refreshes = Some(3);
        let command = WheelCommand::straight(500, 100);

        let err = controller().run_to_targets(&mut link, &command).unwrap_err();

        assert!(matches!(err, MotionError::Link(_)));
        assert_eq!(link.stops, 1);
    }

    #[test]
    fn test_without_timeout_runs_to_completion() {
        let mut link = SimulatedLink::new(7, 7);
        let command = WheelCommand::straight(500, 70);

        let moved = StepController::new(TEST_HZ)
            .run_to_targets(&mut link, &command)
            .unwrap();

        assert_eq!(moved, (70, 70));
    }
}
