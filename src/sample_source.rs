//! Raw sample acquisition: polling an [`ImuDriver`] at a fixed period with
//! a bounded warm-up retry, plus an optional pass-through dump to disk.
//! Grounded on `original_source`'s `mpu6050_data_generator` and
//! `dump_to_file`.

use crate::error::SensorError;
use crate::vector::Vector3;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One raw reading: accelerometer (g), gyroscope (deg/s), and die
/// temperature (Celsius).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub accel: Vector3,
    pub gyro: Vector3,
    pub temp: f64,
}

/// Abstraction over the upstream sensor. A real driver talks to hardware
/// over I2C/SPI; tests and fixtures can supply a canned sequence instead.
pub trait ImuDriver: Send {
    fn get_accel_data(&mut self) -> Result<Vector3, SensorError>;
    fn get_gyro_data(&mut self) -> Result<Vector3, SensorError>;
    fn get_temp(&mut self) -> Result<f64, SensorError>;
}

const WARMUP_WINDOW: Duration = Duration::from_secs(1);
const WARMUP_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Polls an [`ImuDriver`] at a fixed period, producing one [`RawSample`]
/// per cycle until `stop()` is called.
pub struct SampleSource<D: ImuDriver> {
    driver: D,
    dt: Duration,
    stopped: Arc<AtomicBool>,
}

impl<D: ImuDriver> SampleSource<D> {
    pub fn new(driver: D, dt: Duration) -> Self {
        Self {
            driver,
            dt,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that, when `stop()`-ed, ends the iteration loop driven by
    /// [`SampleSource::next_sample`] after the current cycle completes.
    pub fn stop_handle(&self) -> SourceStopHandle {
        SourceStopHandle {
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Poll the sensor until it returns a reading or `WARMUP_WINDOW`
    /// elapses, retrying every `WARMUP_RETRY_DELAY`. Must be called once
    /// before the first [`SampleSource::next_sample`].
    pub fn warm_up(&mut self) -> Result<(), SensorError> {
        let started_at = Instant::now();
        let mut last_err = None;
        while started_at.elapsed() < WARMUP_WINDOW {
            match self.try_read() {
                Ok(_) => return Ok(()),
                Err(err) => {
                    last_err = Some(err);
                    std::thread::sleep(WARMUP_RETRY_DELAY);
                }
            }
        }
        Err(SensorError::InitTimeout(
            WARMUP_WINDOW,
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn try_read(&mut self) -> Result<RawSample, SensorError> {
        Ok(RawSample {
            accel: self.driver.get_accel_data()?,
            gyro: self.driver.get_gyro_data()?,
            temp: self.driver.get_temp()?,
        })
    }

    /// Read one sample and sleep off the remainder of the period, pacing
    /// the stream to `dt`. Returns `None` once stopped.
    pub fn next_sample(&mut self) -> Option<RawSample> {
        if self.stopped.load(Ordering::Relaxed) {
            return None;
        }
        let start = Instant::now();
        let sample = match self.try_read() {
            Ok(sample) => sample,
            Err(err) => {
                warn!(error = %err, "sensor read failed");
                return None;
            }
        };
        let elapsed = start.elapsed();
        if elapsed < self.dt {
            std::thread::sleep(self.dt - elapsed);
        }
        Some(sample)
    }
}

/// External handle used to request a [`SampleSource`] stop producing.
#[derive(Clone)]
pub struct SourceStopHandle {
    stopped: Arc<AtomicBool>,
}

impl SourceStopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

/// Pass-through wrapper writing the first `n_entries` samples it sees to a
/// whitespace-separated text file, then forwarding every sample unchanged.
pub struct DumpToFile {
    file: Option<std::fs::File>,
    remaining: usize,
}

impl DumpToFile {
    pub fn new(path: &Path, n_entries: usize) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        info!(path = %path.display(), n_entries, "starting sample dump");
        Ok(Self {
            file: Some(file),
            remaining: n_entries,
        })
    }

    /// Record `sample` if the dump quota hasn't been exhausted, then
    /// return it unchanged so the caller can forward it downstream.
    pub fn record(&mut self, sample: RawSample) -> RawSample {
        if self.remaining > 0 {
            if let Some(file) = self.file.as_mut() {
                let line = format!(
                    "{} {} {} {} {} {} {}\n",
                    sample.accel.x,
                    sample.accel.y,
                    sample.accel.z,
                    sample.gyro.x,
                    sample.gyro.y,
                    sample.gyro.z,
                    sample.temp
                );
                if file.write_all(line.as_bytes()).is_err() {
                    self.file = None;
                }
            }
            self.remaining -= 1;
            if self.remaining == 0 {
                info!("finished sample dump");
                self.file = None;
            }
        }
        sample
    }
}
