//! motiond - real-time 6-axis IMU sensor fusion and epoch-detection daemon
//!
//! This binary wires the library's pipeline stages together. Argument
//! parsing, calibration-file loading, and the concrete IMU driver are
//! external collaborators outside this crate's scope; the entry point
//! below accepts any [`motiond::ImuDriver`] the embedder supplies.

use motiond::epoch_detector::{EpochDetector, EventClient, EventData};
use motiond::sample_source::RawSample;
use motiond::vector::Vector3;
use motiond::{Config, DaemonError, FusionStage, ImuDriver, MotionTracker, SampleSource};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Driver stand-in used until an embedder wires a real one in; every call
/// fails immediately so the daemon logs a clear startup error instead of
/// silently fusing zeros.
struct UnimplementedDriver;

impl ImuDriver for UnimplementedDriver {
    fn get_accel_data(&mut self) -> Result<Vector3, motiond::error::SensorError> {
        Err(motiond::error::SensorError::ReadFailed(
            "no IMU driver configured".into(),
        ))
    }
    fn get_gyro_data(&mut self) -> Result<Vector3, motiond::error::SensorError> {
        Err(motiond::error::SensorError::ReadFailed(
            "no IMU driver configured".into(),
        ))
    }
    fn get_temp(&mut self) -> Result<f64, motiond::error::SensorError> {
        Err(motiond::error::SensorError::ReadFailed(
            "no IMU driver configured".into(),
        ))
    }
}

/// Forwards epochs straight to the log; a real deployment hands this role
/// to the event-agent transport client instead.
struct LoggingEventClient;

impl EventClient for LoggingEventClient {
    fn send_event(&mut self, epoch_type: &str, data: EventData) {
        tracing::info!(epoch_type, ?data, "epoch fired");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting motiond v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&Config::default_path())?;
    run(config, UnimplementedDriver)?;
    Ok(())
}

fn run<D: ImuDriver>(config: Config, driver: D) -> Result<(), DaemonError> {
    let mut source = SampleSource::new(driver, Duration::from_secs_f64(config.dt));
    source.warm_up()?;

    let tracker = MotionTracker::new(config.time_term, config.dt, config.accel_offsets);
    let mut fusion = FusionStage::new(tracker);

    {
        let mut calibration_samples = std::iter::from_fn(|| source.next_sample());
        fusion.calibrate(&mut calibration_samples, config.calibrate_n)?;
    }

    let fused_samples =
        std::iter::from_fn(move || source.next_sample().map(|raw: RawSample| fusion.fuse(raw)));

    let streamer = motiond::DataStreamer::spawn(fused_samples, 1000, Duration::from_millis(10));
    streamer.add_consumer(EpochDetector::new(LoggingEventClient, config.clone()))?;

    if let Some(port) = config.debug_port {
        let handle = streamer.handle();
        std::thread::spawn(move || {
            if let Err(err) = motiond::debug_server::serve(port, handle) {
                tracing::error!(error = %err, "debug server exited");
            }
        });
    }

    streamer.wait_for_end();
    Ok(())
}
