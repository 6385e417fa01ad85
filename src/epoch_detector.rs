//! Threshold detection over fused samples: orientation deviation, lateral
//! movement, and a hysteretic temperature thermostat. Each fires an event
//! only on the IN/OUT transition, never while steady. Grounded on
//! `original_source`'s `Mpu6050EventTracker`.

use crate::config::Config;
use crate::fusion_stage::FusedSample;
use crate::streamer::Consumer;
use crate::vector::Vector3;
use tracing::info;

/// Epoch type fired for a manual trigger outside the normal detection
/// pipeline (see `simplest_example.py` in the upstream integration).
pub const MANUAL_TRIGGER: &str = "MANUAL_TRIGGER";
pub const ORIENTATION: &str = "ORIENTATION";
pub const MOVEMENT: &str = "MOVEMENT";
pub const TEMPERATURE: &str = "TEMPERATURE";

/// Sink for detected epochs and their enable/disable configuration push.
/// A debug TCP client is not an `EventClient`; only the detector's output
/// is, so a single process can fan the same fused stream out to both at
/// once.
pub trait EventClient: Send {
    fn send_event(&mut self, epoch_type: &str, data: EventData);
    fn on_config_enabled(&mut self, params: &Config) {
        let _ = params;
    }
    fn on_config_disabled(&mut self) {}
}

/// Payload attached to a fired epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventData {
    Orientation { x: f64, y: f64, z: f64 },
    Movement { x: f64, y: f64, z: f64 },
    Temperature { temp: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Conditions {
    orientation: bool,
    movement: bool,
    temperature: bool,
}

/// Detects ORIENTATION, MOVEMENT, and TEMPERATURE epochs from the fused
/// sample stream and forwards them to an [`EventClient`]. Implements
/// [`Consumer`] so it can be registered directly on a
/// [`crate::streamer::DataStreamer`].
pub struct EpochDetector<C: EventClient> {
    client: C,
    config: Config,
    config_state_suppressed: bool,
    in_condition: Conditions,
    temp_min_hysteresis: f64,
    temp_max_hysteresis: f64,
}

impl<C: EventClient> EpochDetector<C> {
    pub fn new(client: C, config: Config) -> Self {
        Self {
            client,
            config,
            config_state_suppressed: false,
            in_condition: Conditions::default(),
            temp_min_hysteresis: 0.0,
            temp_max_hysteresis: 0.0,
        }
    }

    /// Suppress detection entirely while external configuration is being
    /// applied; mirrors the upstream gate between `on_config_enabled` and
    /// `on_config_disabled`.
    pub fn on_config_enabled(&mut self, config: &Config) {
        self.config_state_suppressed = true;
        self.config.max_angle_deviation = config.max_angle_deviation;
        self.client.on_config_enabled(config);
    }

    pub fn on_config_disabled(&mut self) {
        self.config_state_suppressed = false;
        self.client.on_config_disabled();
    }

    fn react(&mut self, sample: &FusedSample) {
        if self.config_state_suppressed {
            return;
        }
        self.react_orientation(sample.angles);
        self.react_movement(sample.position);
        self.react_temperature(sample.temp);
    }

    fn react_orientation(&mut self, angles: (f64, f64, f64)) {
        let max_dev = angles.0.abs().max(angles.1.abs()).max(angles.2.abs());
        let now_in = max_dev > self.config.max_angle_deviation;
        if now_in != self.in_condition.orientation {
            info!(state = if now_in { "IN" } else { "OUT" }, "ORIENTATION epoch condition");
            if now_in {
                self.client.send_event(
                    ORIENTATION,
                    EventData::Orientation {
                        x: angles.0,
                        y: angles.1,
                        z: angles.2,
                    },
                );
            }
        }
        self.in_condition.orientation = now_in;
    }

    fn react_movement(&mut self, position: Vector3) {
        let movement = position.norm();
        let now_in = movement > self.config.max_lateral_movement;
        if now_in != self.in_condition.movement {
            info!(state = if now_in { "IN" } else { "OUT" }, "MOVEMENT epoch condition");
            if now_in {
                self.client.send_event(
                    MOVEMENT,
                    EventData::Movement {
                        x: position.x,
                        y: position.y,
                        z: position.z,
                    },
                );
            }
        }
        self.in_condition.movement = now_in;
    }

    fn react_temperature(&mut self, temp: f64) {
        let min_in = temp < self.config.min_temp + self.temp_min_hysteresis;
        let max_in = temp > self.config.max_temp + self.temp_max_hysteresis;
        let now_in = min_in || max_in;
        let changed = now_in != self.in_condition.temperature;
        if changed {
            info!(state = if now_in { "IN" } else { "OUT" }, "TEMPERATURE epoch condition");
            if now_in {
                self.client.send_event(TEMPERATURE, EventData::Temperature { temp });
            }
            if max_in {
                self.temp_min_hysteresis = -self.config.temp_blind_zone;
                self.temp_max_hysteresis = -self.config.temp_blind_zone;
            } else if min_in {
                self.temp_min_hysteresis = self.config.temp_blind_zone;
                self.temp_max_hysteresis = self.config.temp_blind_zone;
            } else {
                self.temp_min_hysteresis = -self.config.temp_blind_zone;
                self.temp_max_hysteresis = self.config.temp_blind_zone;
            }
        }
        self.in_condition.temperature = now_in;
    }
}

impl<C: EventClient + 'static> Consumer for EpochDetector<C> {
    fn consume(&mut self, sample: FusedSample) {
        self.react(&sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingClient {
        events: Vec<(&'static str, EventData)>,
    }

    impl EventClient for RecordingClient {
        fn send_event(&mut self, epoch_type: &str, data: EventData) {
            self.events.push((
                match epoch_type {
                    ORIENTATION => ORIENTATION,
                    MOVEMENT => MOVEMENT,
                    TEMPERATURE => TEMPERATURE,
                    _ => MANUAL_TRIGGER,
                },
                data,
            ));
        }
    }

    fn sample_with(angles: (f64, f64, f64), position: Vector3, temp: f64) -> FusedSample {
        FusedSample {
            accel: Vector3::zero(),
            gyro: Vector3::zero(),
            temp,
            angles,
            position,
        }
    }

    #[test]
    fn orientation_epoch_fires_only_on_crossing() {
        let mut detector = EpochDetector::new(RecordingClient::default(), Config::default());
        detector.react(&sample_with((10.0, 0.0, 0.0), Vector3::zero(), 25.0));
        detector.react(&sample_with((40.0, 0.0, 0.0), Vector3::zero(), 25.0));
        detector.react(&sample_with((41.0, 0.0, 0.0), Vector3::zero(), 25.0));
        detector.react(&sample_with((10.0, 0.0, 0.0), Vector3::zero(), 25.0));

        assert_eq!(detector.client.events.len(), 1);
        assert_eq!(detector.client.events[0].0, ORIENTATION);
    }

    #[test]
    fn movement_epoch_fires_only_on_crossing() {
        let mut detector = EpochDetector::new(RecordingClient::default(), Config::default());
        detector.react(&sample_with((0.0, 0.0, 0.0), Vector3::new(0.3, 0.0, 0.0), 25.0));
        detector.react(&sample_with((0.0, 0.0, 0.0), Vector3::new(0.35, 0.0, 0.0), 25.0));
        detector.react(&sample_with((0.0, 0.0, 0.0), Vector3::new(0.1, 0.0, 0.0), 25.0));

        assert_eq!(detector.client.events.len(), 1);
        assert_eq!(detector.client.events[0].0, MOVEMENT);
    }

    #[test]
    fn temperature_hysteresis_sequence_matches_reference() {
        // min=15, max=45, blind_zone=1. Only the false->true edge ever
        // fires; exits update the hysteresis state silently.
        let mut detector = EpochDetector::new(RecordingClient::default(), Config::default());

        detector.react_temperature(25.0); // steady, no event
        assert!(detector.client.events.is_empty());

        detector.react_temperature(46.0); // crosses max -> IN, fires
        assert_eq!(detector.client.events.len(), 1);
        assert_eq!(detector.client.events[0].0, TEMPERATURE);

        // entering hot shrank the band to max-blind_zone=44; 40 is below
        // that, so this is an OUT transition. No event, but the band
        // resets to +-blind_zone around the nominal bounds.
        detector.react_temperature(40.0);
        assert_eq!(detector.client.events.len(), 1);

        // re-entering now needs > max+blind_zone=46; 47 crosses it.
        detector.react_temperature(47.0);
        assert_eq!(detector.client.events.len(), 2);
        assert_eq!(detector.client.events[1].0, TEMPERATURE);

        // exit again (band shrunk to 44 by the last entry), widening back
        // to +-blind_zone, then cross the low side.
        detector.react_temperature(40.0);
        assert_eq!(detector.client.events.len(), 2);

        detector.react_temperature(10.0); // below min-blind_zone=14 -> IN, fires
        assert_eq!(detector.client.events.len(), 3);
        assert_eq!(detector.client.events[2].0, TEMPERATURE);
    }

    #[test]
    fn temperature_literal_sequence_fires_once_then_stays_hot() {
        // The documented E3 walk: min=15, max=45, blind_zone=1, feeding
        // T = 46, 44.5, 46, 44.5, 46. The first 46 crosses the nominal
        // max (45) and fires. That entry shrinks the hot band to
        // max-blind_zone=44 per the shift table, and every later value in
        // the sequence (44.5 and 46) stays above 44, so the detector never
        // returns to OUT and no further event fires.
        let mut detector = EpochDetector::new(RecordingClient::default(), Config::default());

        detector.react_temperature(46.0);
        assert_eq!(detector.client.events.len(), 1);
        assert_eq!(detector.client.events[0].0, TEMPERATURE);

        detector.react_temperature(44.5);
        detector.react_temperature(46.0);
        detector.react_temperature(44.5);
        detector.react_temperature(46.0);
        assert_eq!(detector.client.events.len(), 1);
    }

    #[test]
    fn config_enabled_suppresses_detection() {
        let mut detector = EpochDetector::new(RecordingClient::default(), Config::default());
        detector.on_config_enabled(&Config::default());
        detector.react(&sample_with((90.0, 0.0, 0.0), Vector3::zero(), 25.0));
        assert!(detector.client.events.is_empty());

        detector.on_config_disabled();
        detector.react(&sample_with((90.0, 0.0, 0.0), Vector3::zero(), 25.0));
        assert_eq!(detector.client.events.len(), 1);
    }
}
