// Loop rates, control deadlines, calibration overrides

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motion::units::RobotGeometry;

// Control loop frequency
pub const LOOP_HZ: u32 = 10;

// Deadline for a single closed-loop move
pub const CONTROL_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime configuration: robot calibration plus loop settings.
///
/// Defaults match the measured robot; a JSON file can override any subset
/// of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub geometry: RobotGeometry,
    pub loop_hz: u32,
    pub control_timeout_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            geometry: RobotGeometry::default(),
            loop_hz: LOOP_HZ,
            control_timeout_ms: CONTROL_TIMEOUT_MS,
        }
    }
}

impl DriveConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }
}
