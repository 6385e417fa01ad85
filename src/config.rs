//! Daemon configuration: the parameters listed in SPEC_FULL.md §6, plus
//! load/save against a TOML file and a pure parser for the accelerometer
//! calibration file format. Loading *when* to read these from disk (flags,
//! environment) is the out-of-scope CLI's job; this module only owns the
//! shape of the data and its serialization.

use crate::error::ConfigError;
use crate::vector::Vector3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// All tunable parameters of the fusion pipeline and epoch detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Nominal sample period, in seconds.
    pub dt: f64,
    /// Complementary-filter time constant, in seconds.
    pub time_term: f64,
    /// Number of samples consumed for gyro/gravity calibration at startup.
    /// Zero disables calibration entirely.
    pub calibrate_n: usize,
    /// Operator-supplied accelerometer bias, in g.
    pub accel_offsets: Vector3,
    /// Maximum allowed deviation of any basis axis from calibration, in
    /// degrees, before an ORIENTATION epoch fires.
    pub max_angle_deviation: f64,
    /// Maximum allowed lateral displacement, in meters, before a MOVEMENT
    /// epoch fires.
    pub max_lateral_movement: f64,
    /// Lower thermostat bound, in Celsius.
    pub min_temp: f64,
    /// Upper thermostat bound, in Celsius.
    pub max_temp: f64,
    /// Hysteresis half-width applied to the thermostat band, in Celsius.
    pub temp_blind_zone: f64,
    /// Optional TCP port for the debug fan-out server.
    pub debug_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dt: 0.011,
            time_term: 0.5,
            calibrate_n: 300,
            accel_offsets: Vector3::zero(),
            max_angle_deviation: 30.0,
            max_lateral_movement: 0.2,
            min_temp: 15.0,
            max_temp: 45.0,
            temp_blind_zone: 1.0,
            debug_port: None,
        }
    }
}

impl Config {
    /// Validate the preconditions the rest of the crate relies on:
    /// a positive sample period and a thermostat band wide enough that
    /// the hysteresis shift from §4.6 cannot invert the band.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dt <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if self.time_term <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_term must be positive, got {}",
                self.time_term
            )));
        }
        if self.max_temp <= self.min_temp {
            return Err(ConfigError::Invalid(format!(
                "max_temp ({}) must exceed min_temp ({})",
                self.max_temp, self.min_temp
            )));
        }
        if 2.0 * self.temp_blind_zone >= self.max_temp - self.min_temp {
            return Err(ConfigError::Invalid(format!(
                "2 * temp_blind_zone ({}) must be less than max_temp - min_temp ({})",
                2.0 * self.temp_blind_zone,
                self.max_temp - self.min_temp
            )));
        }
        Ok(())
    }

    /// The complementary-filter weight `rot_decay = time_term / (time_term + dt)`.
    pub fn rot_decay(&self) -> f64 {
        self.time_term / (self.time_term + self.dt)
    }

    /// Resolve the default config file path under the platform's data
    /// directory (mirrors the layout the reference daemon's own
    /// configuration surface uses).
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "motiond", "motiond")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("motiond.toml"))
    }

    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML file, creating parent directories
    /// as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

/// Parse the accelerometer calibration file format from SPEC_FULL.md §6:
/// a JSON object with `x_offs`, `y_offs`, `z_offs` decimal fields.
pub fn load_accel_offsets(path: &Path) -> Result<Vector3, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: CalibrationFile = serde_json::from_str(&content)?;
    Ok(Vector3::new(parsed.x_offs, parsed.y_offs, parsed.z_offs))
}

#[derive(Debug, Deserialize)]
struct CalibrationFile {
    x_offs: f64,
    y_offs: f64,
    z_offs: f64,
}
