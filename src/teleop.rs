// Keyboard teleoperation: WASD drive with live odometry
//
// Key events are drained into a snapshot once per tick; a key counts as
// held while its last press is fresher than the hold window, which also
// covers terminals that never deliver release events. Pose is integrated
// from wraparound-corrected step deltas every tick and logged once per
// second.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{info, warn};

use crate::config::DriveConfig;
use crate::link::{stop_best_effort, LinkError, RobotLink};
use crate::motion::odometry::{integrate, Pose};
use crate::motion::units::step_delta;
use crate::motion::MotionError;

/// Wheel speed for straight travel, steps/s.
pub const FORWARD_SPEED: i32 = 500;
/// Wheel speed for the slower wheel when turning, steps/s.
pub const TURN_SPEED: i32 = 300;

// A key is treated as held while its last press is at most this old.
const KEY_HOLD: Duration = Duration::from_millis(150);
const POSE_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone, Copy)]
struct KeyState {
    forward: Option<Instant>,
    backward: Option<Instant>,
    left: Option<Instant>,
    right: Option<Instant>,
}

impl KeyState {
    fn press(&mut self, code: KeyCode, at: Instant) {
        match code {
            KeyCode::Char('w') => self.forward = Some(at),
            KeyCode::Char('s') => self.backward = Some(at),
            KeyCode::Char('a') => self.left = Some(at),
            KeyCode::Char('d') => self.right = Some(at),
            _ => {}
        }
    }

    fn release(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('w') => self.forward = None,
            KeyCode::Char('s') => self.backward = None,
            KeyCode::Char('a') => self.left = None,
            KeyCode::Char('d') => self.right = None,
            _ => {}
        }
    }

    /// Maps the held keys to (left, right) wheel speeds in steps/s.
    fn wheel_speeds(&self, now: Instant) -> (i32, i32) {
        let held = |pressed: Option<Instant>| {
            pressed.is_some_and(|at| now.duration_since(at) < KEY_HOLD)
        };
        let w = held(self.forward);
        let s = held(self.backward);
        let a = held(self.left);
        let d = held(self.right);

        match (w, s, a, d) {
            (true, _, true, _) => (TURN_SPEED, FORWARD_SPEED), // forward-left
            (true, _, _, true) => (FORWARD_SPEED, TURN_SPEED), // forward-right
            (_, true, true, _) => (-TURN_SPEED, -FORWARD_SPEED), // backward-left
            (_, true, _, true) => (-FORWARD_SPEED, -TURN_SPEED), // backward-right
            (true, ..) => (FORWARD_SPEED, FORWARD_SPEED),
            (_, true, ..) => (-FORWARD_SPEED, -FORWARD_SPEED),
            (_, _, true, _) => (-TURN_SPEED, TURN_SPEED), // pivot left
            (_, _, _, true) => (TURN_SPEED, -TURN_SPEED), // pivot right
            _ => (0, 0),
        }
    }
}

/// Runs teleoperation until Q, Esc or Ctrl+C; returns the final pose.
///
/// The robot is stopped on every exit path, clean or not.
pub fn run<L: RobotLink>(
    link: &mut L,
    config: &DriveConfig,
    initial_pose: Pose,
) -> Result<Pose, MotionError> {
    enable_raw_mode().map_err(io_err)?;
    let result = teleop_loop(link, config, initial_pose);
    if let Err(e) = disable_raw_mode() {
        warn!("failed to restore terminal mode: {}", e);
    }
    result
}

fn teleop_loop<L: RobotLink>(
    link: &mut L,
    config: &DriveConfig,
    initial_pose: Pose,
) -> Result<Pose, MotionError> {
    let period = Duration::from_secs_f64(1.0 / f64::from(config.loop_hz));
    let mut keys = KeyState::default();
    let mut pose = initial_pose;

    if let Err(e) = link.refresh_sensors() {
        stop_best_effort(link);
        return Err(e.into());
    }
    let mut left_last = link.left_step_count();
    let mut right_last = link.right_step_count();
    let mut last_log = Instant::now();

    info!("teleoperation started at {} Hz", config.loop_hz);

    loop {
        // Block for up to one tick on the first event, then drain the rest.
        let mut wait = period;
        while event::poll(wait).map_err(io_err)? {
            wait = Duration::ZERO;
            if let Event::Key(KeyEvent {
                code,
                kind,
                modifiers,
                ..
            }) = event::read().map_err(io_err)?
            {
                let quit = matches!(code, KeyCode::Char('q') | KeyCode::Esc)
                    || (code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL));
                if quit && kind == KeyEventKind::Press {
                    link.stop_all()?;
                    info!("teleoperation stopped, final {}", pose);
                    return Ok(pose);
                }
                match kind {
                    KeyEventKind::Press | KeyEventKind::Repeat => {
                        keys.press(code, Instant::now());
                    }
                    KeyEventKind::Release => keys.release(code),
                }
            }
        }

        let (left_speed, right_speed) = keys.wheel_speeds(Instant::now());
        link.set_commanded_speeds(left_speed, right_speed);
        if let Err(e) = link.send_command() {
            stop_best_effort(link);
            return Err(e.into());
        }

        if let Err(e) = link.refresh_sensors() {
            stop_best_effort(link);
            return Err(e.into());
        }
        let left_current = link.left_step_count();
        let right_current = link.right_step_count();
        pose = integrate(
            &config.geometry,
            pose,
            step_delta(left_last, left_current),
            step_delta(right_last, right_current),
        );
        left_last = left_current;
        right_last = right_current;

        if last_log.elapsed() >= POSE_LOG_INTERVAL {
            info!("{}", pose);
            last_log = Instant::now();
        }
    }
}

fn io_err(e: io::Error) -> MotionError {
    MotionError::Link(LinkError::Io(e))
}
