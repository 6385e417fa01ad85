//! End-to-end coverage of the full pipeline: sample source -> fusion stage
//! -> streamer -> epoch detector, exercised through the public API rather
//! than any single module's internals.

use motiond::config::Config;
use motiond::epoch_detector::{EpochDetector, EventClient, EventData, MOVEMENT, ORIENTATION};
use motiond::error::SensorError;
use motiond::sample_source::ImuDriver;
use motiond::vector::Vector3;
use motiond::{DataStreamer, FusionStage, MotionTracker, SampleSource};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedDriver {
    accel: VecDeque<Vector3>,
    gyro: VecDeque<Vector3>,
    temp: VecDeque<f64>,
}

impl ScriptedDriver {
    fn new(steps: Vec<(Vector3, Vector3, f64)>) -> Self {
        let mut accel = VecDeque::new();
        let mut gyro = VecDeque::new();
        let mut temp = VecDeque::new();
        for (a, g, t) in steps {
            accel.push_back(a);
            gyro.push_back(g);
            temp.push_back(t);
        }
        Self { accel, gyro, temp }
    }
}

impl ImuDriver for ScriptedDriver {
    fn get_accel_data(&mut self) -> Result<Vector3, SensorError> {
        self.accel
            .pop_front()
            .ok_or_else(|| SensorError::ReadFailed("scripted driver exhausted".into()))
    }
    fn get_gyro_data(&mut self) -> Result<Vector3, SensorError> {
        self.gyro
            .pop_front()
            .ok_or_else(|| SensorError::ReadFailed("scripted driver exhausted".into()))
    }
    fn get_temp(&mut self) -> Result<f64, SensorError> {
        self.temp
            .pop_front()
            .ok_or_else(|| SensorError::ReadFailed("scripted driver exhausted".into()))
    }
}

#[derive(Clone, Default)]
struct CollectingClient {
    events: Arc<Mutex<Vec<(&'static str, EventData)>>>,
}

impl EventClient for CollectingClient {
    fn send_event(&mut self, epoch_type: &str, data: EventData) {
        let tag = match epoch_type {
            ORIENTATION => ORIENTATION,
            MOVEMENT => MOVEMENT,
            "TEMPERATURE" => "TEMPERATURE",
            _ => "MANUAL_TRIGGER",
        };
        self.events.lock().unwrap().push((tag, data));
    }
}

fn at_rest_steps(n: usize) -> Vec<(Vector3, Vector3, f64)> {
    (0..n)
        .map(|_| (Vector3::new(0.0, 0.0, 1.0), Vector3::zero(), 25.0))
        .collect()
}

/// E2: a sustained tilt beyond the threshold fires exactly one
/// ORIENTATION epoch, and holding the tilt does not re-fire.
#[test]
fn sustained_tilt_fires_orientation_epoch_once() {
    let dt = 0.011;
    let mut calibration = at_rest_steps(50);
    let theta = 45.0_f64.to_radians();
    let tilted_accel = Vector3::new(theta.sin(), 0.0, theta.cos());
    let mut steps = Vec::new();
    steps.append(&mut calibration);
    for _ in 0..400 {
        steps.push((tilted_accel, Vector3::zero(), 25.0));
    }

    let driver = ScriptedDriver::new(steps);
    let mut source = SampleSource::new(driver, Duration::from_millis(0));
    source.warm_up().unwrap();

    let tracker = MotionTracker::new(0.5, dt, Vector3::zero());
    let mut fusion = FusionStage::new(tracker);
    {
        let mut calib_iter = std::iter::from_fn(|| source.next_sample());
        fusion.calibrate(&mut calib_iter, 50).unwrap();
    }

    let fused = std::iter::from_fn(move || source.next_sample().map(|raw| fusion.fuse(raw)));
    let streamer = DataStreamer::spawn(fused, 1000, Duration::from_millis(50));

    let client = CollectingClient::default();
    let events = Arc::clone(&client.events);
    let mut config = Config::default();
    config.max_angle_deviation = 30.0;
    streamer
        .add_consumer(EpochDetector::new(client, config))
        .unwrap();

    streamer.wait_for_end();

    let events = events.lock().unwrap();
    let orientation_events: Vec<_> = events.iter().filter(|(t, _)| *t == ORIENTATION).collect();
    assert_eq!(orientation_events.len(), 1, "expected exactly one ORIENTATION epoch, got {:?}", events);
}

/// E5: while config is "enabled" (external override active), no epochs
/// fire even for inputs that would otherwise cross every threshold.
#[test]
fn config_enabled_suppresses_all_epochs() {
    let mut config = Config::default();
    config.max_angle_deviation = 5.0;
    config.max_lateral_movement = 0.01;

    let client = CollectingClient::default();
    let events = Arc::clone(&client.events);
    let mut detector = EpochDetector::new(client, config.clone());
    detector.on_config_enabled(&config);

    for i in 0..100 {
        let sample = motiond::FusedSample {
            accel: Vector3::zero(),
            gyro: Vector3::zero(),
            temp: 25.0,
            angles: (90.0, 0.0, (i as f64)),
            position: Vector3::new(5.0, 5.0, 5.0),
        };
        motiond::streamer::Consumer::consume(&mut detector, sample);
    }

    assert!(events.lock().unwrap().is_empty());
}

/// Liveness under consumer stall: one consumer sleeps on every sample, a
/// second keeps up. Both threads must still terminate when the source is
/// exhausted, and the fast consumer must not lose any samples because of
/// the slow one.
#[test]
fn streamer_remains_live_when_one_consumer_stalls() {
    // warm_up() consumes one reading to confirm the sensor is alive, so
    // 31 scripted readings leave exactly 30 for the fused stream below.
    let driver = ScriptedDriver::new(at_rest_steps(31));
    let mut source = SampleSource::new(driver, Duration::from_millis(0));
    source.warm_up().unwrap();

    let tracker = MotionTracker::new(0.5, 0.011, Vector3::zero());
    let mut fusion = FusionStage::new(tracker);
    let fused = std::iter::from_fn(move || source.next_sample().map(|raw| fusion.fuse(raw)));

    let streamer = DataStreamer::spawn(fused, 2, Duration::from_millis(5));

    let fast_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let fast_counter = Arc::clone(&fast_count);
    streamer
        .add_consumer(move |_sample: motiond::FusedSample| {
            fast_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .unwrap();
    streamer
        .add_consumer(|_sample: motiond::FusedSample| {
            std::thread::sleep(Duration::from_millis(20));
        })
        .unwrap();

    streamer.wait_for_end();
    assert_eq!(fast_count.load(std::sync::atomic::Ordering::SeqCst), 30);
}
