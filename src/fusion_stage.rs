//! Glues raw sample acquisition to the fusion filter: runs the one-shot
//! startup calibration, then emits one [`FusedSample`] per raw reading.
//! Grounded on `original_source`'s `motiontracker_data_generator`.

use crate::error::FusionError;
use crate::motion_tracker::MotionTracker;
use crate::sample_source::RawSample;
use crate::vector::Vector3;
use tracing::info;

/// One fully fused output: the raw reading plus the filter's current
/// orientation and position estimate. This is the value the
/// [`crate::streamer::DataStreamer`] fans out to every consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedSample {
    pub accel: Vector3,
    pub gyro: Vector3,
    pub temp: f64,
    pub angles: (f64, f64, f64),
    pub position: Vector3,
}

impl FusedSample {
    /// Flatten into the 13 native-endian f32 values the wire format
    /// expects: ax, ay, az, gx, gy, gz, temp, angle_x, angle_y, angle_z,
    /// pos_x, pos_y, pos_z.
    pub fn to_wire(self) -> [f32; 13] {
        [
            self.accel.x as f32,
            self.accel.y as f32,
            self.accel.z as f32,
            self.gyro.x as f32,
            self.gyro.y as f32,
            self.gyro.z as f32,
            self.temp as f32,
            self.angles.0 as f32,
            self.angles.1 as f32,
            self.angles.2 as f32,
            self.position.x as f32,
            self.position.y as f32,
            self.position.z as f32,
        ]
    }
}

/// Runs calibration and per-sample fusion over a [`MotionTracker`].
pub struct FusionStage {
    tracker: MotionTracker,
}

impl FusionStage {
    pub fn new(tracker: MotionTracker) -> Self {
        Self { tracker }
    }

    /// Consume `calibrate_n` raw samples from `source` to calibrate the
    /// tracker before fusion begins. A `calibrate_n` of zero is a no-op:
    /// the tracker fuses with whatever gyro bias/gravity reference it was
    /// constructed with (typically none).
    pub fn calibrate<I>(&mut self, source: &mut I, calibrate_n: usize) -> Result<(), FusionError>
    where
        I: Iterator<Item = RawSample>,
    {
        if calibrate_n == 0 {
            return Ok(());
        }
        info!(calibrate_n, "starting calibration, don't move the device");
        self.tracker.start_calibration();
        for _ in 0..calibrate_n {
            match source.next() {
                Some(sample) => self.tracker.add_sample(sample.accel, sample.gyro),
                None => break,
            }
        }
        self.tracker.finish_calibration()?;
        info!("calibration finished");
        Ok(())
    }

    /// Fuse one raw sample, advancing filter state and returning the
    /// combined output.
    pub fn fuse(&mut self, sample: RawSample) -> FusedSample {
        self.tracker.add_sample(sample.accel, sample.gyro);
        FusedSample {
            accel: sample.accel,
            gyro: sample.gyro,
            temp: sample.temp,
            angles: self.tracker.angles(),
            position: self.tracker.position(),
        }
    }
}
