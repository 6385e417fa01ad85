//! motiond - real-time 6-axis IMU sensor fusion and epoch-detection daemon
//!
//! Polls an accelerometer/gyroscope at a fixed rate, fuses the readings
//! into an orientation and lateral-position estimate with a complementary
//! filter, fans the fused stream out to any number of consumers, and
//! raises ORIENTATION/MOVEMENT/TEMPERATURE epochs when those estimates
//! cross configured thresholds.

pub mod config;
pub mod debug_server;
pub mod epoch_detector;
pub mod error;
pub mod fusion_stage;
pub mod motion_tracker;
pub mod sample_source;
pub mod streamer;
pub mod vector;

pub use config::Config;
pub use error::DaemonError;
pub use fusion_stage::{FusedSample, FusionStage};
pub use motion_tracker::MotionTracker;
pub use sample_source::{ImuDriver, RawSample, SampleSource};
pub use streamer::DataStreamer;
pub use vector::Vector3;
