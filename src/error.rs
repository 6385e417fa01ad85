//! Crate-wide error types, one `thiserror` enum per failing subsystem,
//! composed into [`DaemonError`] for the binary entry point.

use thiserror::Error;

/// Errors raised by the [`crate::sample_source::SampleSource`] while
/// bringing up or reading the upstream sensor.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Sensor init kept failing for the whole retry window.
    #[error("sensor failed to initialize after retrying for {0:?}: {1}")]
    InitTimeout(std::time::Duration, String),

    /// A read failed once the source had already finished warm-up.
    #[error("sensor read failed: {0}")]
    ReadFailed(String),
}

/// Errors raised by [`crate::motion_tracker::MotionTracker`]. These reflect
/// contract violations (the caller fed data the fusion math cannot process)
/// rather than recoverable I/O conditions.
#[derive(Debug, Error)]
pub enum FusionError {
    /// `finish_calibration` was called with no samples collected.
    #[error("cannot finish calibration: no samples were collected")]
    EmptyCalibration,
}

/// Errors raised while loading or validating [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file as TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to parse calibration file as JSON: {0}")]
    CalibrationParse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised by [`crate::streamer::DataStreamer`].
#[derive(Debug, Error)]
pub enum StreamerError {
    /// `add_consumer` was called after `request_stop`.
    #[error("streamer has already been stopped")]
    AlreadyStopped,
}

/// Top-level error type for the `motiond` binary.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Streamer(#[from] StreamerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
