//! Stateful sensor-fusion filter: complementary filter over gyro-propagated
//! orientation and accelerometer-derived gravity, plus trapezoidal
//! integration of lateral position. Grounded on `original_source`'s
//! `motion_tracker.py`; single-threaded by construction, only the pipeline
//! producer ever touches an instance.

use crate::error::FusionError;
use crate::vector::Vector3;

/// Degenerate-acceleration guard: below this magnitude, step 3 of the
/// fusion step (`gravity_a = acc * (gravity_magnitude / |acc|)`) would
/// divide by a near-zero number. The source has no such guard and would
/// propagate `inf`/`NaN`; this implementation skips the accelerometer
/// correction for that step instead, per SPEC_FULL.md §9.
const ACCEL_NORM_EPSILON: f64 = 1e-6;

/// Angular-rate guard below which gyro propagation is skipped entirely
/// (mirrors the source's `angle < 1e-5` check in `_gyro_to_angleaxis`).
const GYRO_ANGLE_EPSILON: f64 = 1e-5;

/// Per-step velocity leakage applied after integration, preventing
/// unbounded drift in the unobservable linear-velocity state.
const VELOCITY_LEAKAGE: f64 = 0.99;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalibrationState {
    Idle,
    Collecting,
}

/// Running sums accumulated during calibration: `[ax, ay, az, gx, gy, gz]`.
#[derive(Debug, Clone, Copy, Default)]
struct CalibrationSums {
    accel: Vector3,
    gyro: Vector3,
    n: usize,
}

/// Orientation + position sensor-fusion filter over raw accel/gyro samples.
#[derive(Debug, Clone)]
pub struct MotionTracker {
    dt: f64,
    rot_decay: f64,
    accel_offs: Vector3,

    gyro_offs: Vector3,
    gravity_init: Vector3,
    gravity_magnitude: f64,

    basis_init_x: Vector3,
    basis_init_y: Vector3,
    basis_init_z: Vector3,

    basis_x: Vector3,
    basis_y: Vector3,
    basis_z: Vector3,
    gravity: Vector3,

    velocity: Vector3,
    world_pos: Vector3,

    calibration_state: CalibrationState,
    calibration_sums: CalibrationSums,
}

impl MotionTracker {
    /// Construct an idle tracker. `time_term` is the complementary-filter
    /// time constant (seconds); `dt` is the nominal sample period
    /// (seconds); `accel_offs` is the operator-supplied accelerometer bias.
    pub fn new(time_term: f64, dt: f64, accel_offs: Vector3) -> Self {
        Self {
            dt,
            rot_decay: time_term / (time_term + dt),
            accel_offs,
            gyro_offs: Vector3::zero(),
            gravity_init: Vector3::zero(),
            gravity_magnitude: 0.0,
            basis_init_x: Vector3::unit_x(),
            basis_init_y: Vector3::unit_y(),
            basis_init_z: Vector3::unit_x().cross(&Vector3::unit_y()),
            basis_x: Vector3::unit_x(),
            basis_y: Vector3::unit_y(),
            basis_z: Vector3::unit_x().cross(&Vector3::unit_y()),
            gravity: Vector3::zero(),
            velocity: Vector3::zero(),
            world_pos: Vector3::zero(),
            calibration_state: CalibrationState::Idle,
            calibration_sums: CalibrationSums::default(),
        }
    }

    /// Begin (or restart) calibration: zeroes the accumulators. Calling
    /// this again while already collecting restarts the accumulation
    /// rather than erroring — the source has no guard here at all, and a
    /// restart is the least surprising implementer's choice (see
    /// SPEC_FULL.md §9.1).
    pub fn start_calibration(&mut self) {
        self.calibration_state = CalibrationState::Collecting;
        self.calibration_sums = CalibrationSums::default();
    }

    /// Feed one raw sample. During calibration this only accumulates
    /// statistics; otherwise it performs one fusion step and updates the
    /// orientation basis and position.
    pub fn add_sample(&mut self, acc_raw: Vector3, gyro_raw: Vector3) {
        match self.calibration_state {
            CalibrationState::Collecting => {
                self.calibration_sums.accel = self.calibration_sums.accel.add(&acc_raw);
                self.calibration_sums.gyro = self.calibration_sums.gyro.add(&gyro_raw);
                self.calibration_sums.n += 1;
            }
            CalibrationState::Idle => self.fusion_step(acc_raw, gyro_raw),
        }
    }

    /// Finish calibration: compute per-axis means, derive gyro bias and
    /// reference gravity, and reset the basis/position to their initial
    /// state. Requires at least one sample to have been collected.
    pub fn finish_calibration(&mut self) -> Result<(), FusionError> {
        let n = self.calibration_sums.n;
        if n == 0 {
            return Err(FusionError::EmptyCalibration);
        }
        let inv_n = 1.0 / n as f64;
        let mean_accel = self.calibration_sums.accel.scale(inv_n);
        let mean_gyro = self.calibration_sums.gyro.scale(inv_n);

        self.gyro_offs = mean_gyro;
        self.gravity = mean_accel.sub(&self.accel_offs);
        self.gravity_init = self.gravity;
        self.gravity_magnitude = self.gravity.norm();

        self.basis_init_x = Vector3::unit_x();
        self.basis_init_y = Vector3::unit_y();
        self.basis_init_z = self.basis_init_x.cross(&self.basis_init_y);

        self.basis_x = self.basis_init_x;
        self.basis_y = self.basis_init_y;
        self.basis_z = self.basis_init_z;

        self.velocity = Vector3::zero();
        self.world_pos = Vector3::zero();

        self.calibration_state = CalibrationState::Idle;
        Ok(())
    }

    /// One complementary-filter step. See SPEC_FULL.md §4.2 for the
    /// numbered derivation this mirrors line for line.
    fn fusion_step(&mut self, acc_raw: Vector3, gyro_raw: Vector3) {
        let gyro = gyro_raw.sub(&self.gyro_offs);
        let acc = acc_raw.sub(&self.accel_offs);

        let hpf = self.rot_decay;
        let lpf = 1.0 - hpf;

        // Step 2: gyro propagation. Rotation vector in radians/sample.
        let delta_theta = gyro.scale(self.dt * DEG_TO_RAD);
        let delta_angle = delta_theta.norm();

        let (basis_g_x, basis_g_y, gravity_g) = if delta_angle < GYRO_ANGLE_EPSILON {
            (self.basis_x, self.basis_y, self.gravity)
        } else {
            // Axis is negated: a device-frame rotation rate maps to the
            // opposite-sense rotation of the world-frame basis. Preserved
            // bit-for-bit from the source; see SPEC_FULL.md §9.
            let axis = delta_theta.scale(-1.0 / delta_angle);
            (
                self.basis_x.rotate(&axis, delta_angle),
                self.basis_y.rotate(&axis, delta_angle),
                self.gravity.rotate(&axis, delta_angle),
            )
        };

        // Step 3: accelerometer-derived gravity, rescaled to the
        // calibrated magnitude. Skips the correction on a degenerate
        // reading instead of dividing by ~0 (SPEC_FULL.md §9 FP guard).
        let acc_norm = acc.norm();
        let gravity_a = if acc_norm < ACCEL_NORM_EPSILON {
            gravity_g
        } else {
            acc.scale(self.gravity_magnitude / acc_norm)
        };

        // Step 4: complementary blend.
        let gravity_f = gravity_a.scale(lpf).add(&gravity_g.scale(hpf));

        // Step 5: correction rotation applied to the propagated basis.
        let fix_angle = gravity_g.angle_to(&gravity_f);
        let fix_axis = gravity_f.cross(&gravity_g);
        self.basis_x = basis_g_x.rotate(&fix_axis, fix_angle);
        self.basis_y = basis_g_y.rotate(&fix_axis, fix_angle);
        self.basis_z = self.basis_x.cross(&self.basis_y);

        // Step 6: persist the *unblended* accelerometer gravity for next
        // step's propagation. This looks inconsistent with a
        // complementary filter but is the source's actual behavior;
        // replicated intentionally (SPEC_FULL.md §9).
        self.gravity = gravity_a;

        // Steps 7-8: linear acceleration and trapezoidal integration with
        // velocity leakage.
        let lin_acc = acc.sub(&gravity_f);
        let new_velocity = self.velocity.add(&lin_acc.scale(self.dt));
        self.world_pos = self
            .world_pos
            .add(&self.velocity.scale(self.dt / 2.0))
            .add(&new_velocity.scale(self.dt / 2.0));
        self.velocity = new_velocity.scale(VELOCITY_LEAKAGE);
    }

    /// Absolute deviation of each world-frame basis axis from its
    /// calibrated orientation, in degrees. Non-negative by construction
    /// (each component is an `acos`-derived angle).
    pub fn angles(&self) -> (f64, f64, f64) {
        (
            self.basis_x.angle_to(&self.basis_init_x) * RAD_TO_DEG,
            self.basis_y.angle_to(&self.basis_init_y) * RAD_TO_DEG,
            self.basis_z.angle_to(&self.basis_init_z) * RAD_TO_DEG,
        )
    }

    /// Integrated lateral displacement since calibration, in meters.
    pub fn position(&self) -> Vector3 {
        self.world_pos
    }

    /// Current gravity-magnitude reference captured at calibration end.
    /// Zero before the first `finish_calibration`.
    pub fn gravity_magnitude(&self) -> f64 {
        self.gravity_magnitude
    }

    #[cfg(test)]
    fn basis(&self) -> (Vector3, Vector3, Vector3) {
        (self.basis_x, self.basis_y, self.basis_z)
    }
}
