// Unit conversions between motor steps, wheel rotation, and ground distance.
//
// The robot reports wheel motion as step counts from a wrapping 16-bit
// counter; everything else in the crate works in millimetres and radians.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Wheel diameter, measured with calipers.
pub const WHEEL_DIAMETER_MM: f64 = 41.0;

/// Distance between the wheel contact points, measured with calipers.
pub const AXLE_LENGTH_MM: f64 = 53.0;

/// Motor step resolution per full wheel rotation.
pub const STEPS_PER_REVOLUTION: f64 = 1000.0;

/// Range of the robot's wrapping step counters.
pub const MAX_STEP_COUNT: i32 = 1 << 15;

/// Physical calibration of a differential-drive base.
///
/// Constructed once (defaults or a JSON config file) and passed to every
/// component that converts between steps and ground distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotGeometry {
    pub wheel_diameter_mm: f64,
    pub axle_length_mm: f64,
    pub steps_per_revolution: f64,
}

impl Default for RobotGeometry {
    fn default() -> Self {
        Self {
            wheel_diameter_mm: WHEEL_DIAMETER_MM,
            axle_length_mm: AXLE_LENGTH_MM,
            steps_per_revolution: STEPS_PER_REVOLUTION,
        }
    }
}

impl RobotGeometry {
    pub fn wheel_radius_mm(&self) -> f64 {
        self.wheel_diameter_mm / 2.0
    }

    /// Half the axle length; the lever arm of each wheel around the
    /// robot's center of rotation.
    pub fn half_axle_mm(&self) -> f64 {
        self.axle_length_mm / 2.0
    }

    /// Motor steps to radians of wheel rotation.
    pub fn steps_to_rad(&self, steps: f64) -> f64 {
        TAU * steps / self.steps_per_revolution
    }

    /// Radians of wheel rotation to motor steps, truncated toward zero.
    pub fn rad_to_steps(&self, rad: f64) -> i32 {
        (rad * self.steps_per_revolution / TAU) as i32
    }

    /// Radians of wheel rotation to ground distance.
    pub fn rad_to_mm(&self, rad: f64) -> f64 {
        rad * self.wheel_radius_mm()
    }

    /// Ground distance to radians of wheel rotation.
    pub fn mm_to_rad(&self, mm: f64) -> f64 {
        mm / self.wheel_radius_mm()
    }

    /// Motor steps to ground distance.
    pub fn steps_to_mm(&self, steps: f64) -> f64 {
        self.rad_to_mm(self.steps_to_rad(steps))
    }

    /// Ground distance to motor steps, truncated toward zero.
    pub fn mm_to_steps(&self, mm: f64) -> i32 {
        self.rad_to_steps(self.mm_to_rad(mm))
    }
}

/// Signed step delta between two raw counter readings.
///
/// The counters wrap at [`MAX_STEP_COUNT`]; a raw difference larger than
/// half the range is a wrap artifact and is folded back. Must be used
/// whenever two raw sensor readings are compared, since the counter may
/// have wrapped between samples.
pub fn step_delta(last: i32, current: i32) -> i32 {
    let mut delta = current - last;
    if delta > MAX_STEP_COUNT / 2 {
        delta -= MAX_STEP_COUNT;
    } else if delta < -(MAX_STEP_COUNT / 2) {
        delta += MAX_STEP_COUNT;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_mm_round_trip() {
        let geometry = RobotGeometry::default();
        for steps in [0, 1, 250, 1000, 5000, -778] {
            let round_trip = geometry.mm_to_steps(geometry.steps_to_mm(steps as f64));
            assert!(
                (round_trip - steps).abs() <= 1,
                "round trip of {} steps gave {}",
                steps,
                round_trip
            );
        }
    }

    #[test]
    fn test_mm_to_steps_truncates_toward_zero() {
        let geometry = RobotGeometry::default();
        assert_eq!(geometry.mm_to_steps(10.0), 77);
        assert_eq!(geometry.mm_to_steps(-10.0), -77);
    }

    #[test]
    fn test_full_revolution_is_wheel_circumference() {
        let geometry = RobotGeometry::default();
        let circumference = std::f64::consts::PI * geometry.wheel_diameter_mm;
        let mm = geometry.steps_to_mm(geometry.steps_per_revolution);
        assert!((mm - circumference).abs() < 1e-9);
    }

    #[test]
    fn test_step_delta_plain() {
        assert_eq!(step_delta(200, 500), 300);
        assert_eq!(step_delta(500, 200), -300);
        assert_eq!(step_delta(0, 0), 0);
    }

    #[test]
    fn test_step_delta_forward_wrap() {
        // Counter wrapped past the top while moving forward: the raw delta
        // is a huge negative jump, the corrected one a small advance.
        assert_eq!(step_delta(32000, 500), 1268);
    }

    #[test]
    fn test_step_delta_backward_wrap() {
        assert_eq!(step_delta(500, 32000), -1268);
    }
}
