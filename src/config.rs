use crate::types::EngineError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Old Town / River North, Chicago.
pub const DEFAULT_OBSERVER_LAT: f64 = 41.9100;
pub const DEFAULT_OBSERVER_LNG: f64 = -87.6350;

pub const DEFAULT_PROBE_DISTANCES: [f64; 7] = [15.0, 30.0, 50.0, 80.0, 120.0, 180.0, 260.0];

/// Engine configuration. Every field has a default, so a partial JSON
/// document (or `{}`) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub observer_lat: f64,
    pub observer_lng: f64,
    pub timezone: Tz,
    /// Buildings shorter than this never cast a shadow (meters).
    pub min_caster_height: f64,
    /// Buildings closer than this to the venue are its own building (meters).
    pub self_exclusion_radius: f64,
    /// Search radius around each probe point (meters).
    pub match_radius: f64,
    /// Max angle between sun azimuth and building bearing (radians).
    pub max_angle_off_sun: f64,
    /// Distances toward the sun at which to probe (meters, increasing).
    pub probe_distances: Vec<f64>,
    pub night_altitude: f64,
    pub high_sun_altitude: f64,
    /// Cloud-sun factor below which geometric sun is overridden to shade.
    pub heavy_overcast_factor: f64,
    pub cpu_cores: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            observer_lat: DEFAULT_OBSERVER_LAT,
            observer_lng: DEFAULT_OBSERVER_LNG,
            timezone: chrono_tz::America::Chicago,
            min_caster_height: 6.0,
            self_exclusion_radius: 8.0,
            match_radius: 40.0,
            max_angle_off_sun: std::f64::consts::PI / 7.0,
            probe_distances: DEFAULT_PROBE_DISTANCES.to_vec(),
            night_altitude: 1.0,
            high_sun_altitude: 70.0,
            heavy_overcast_factor: 0.2,
            cpu_cores: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_timezone_name(mut self, name: &str) -> Result<Self, EngineError> {
        self.timezone = name
            .parse::<Tz>()
            .map_err(|_| EngineError::Timezone(name.to_string()))?;
        Ok(self)
    }

    pub fn get_cpu_cores(&self) -> usize {
        self.cpu_cores.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(-90.0..=90.0).contains(&self.observer_lat) {
            return Err(EngineError::Config(format!(
                "observer latitude {} out of range",
                self.observer_lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.observer_lng) {
            return Err(EngineError::Config(format!(
                "observer longitude {} out of range",
                self.observer_lng
            )));
        }
        if self.probe_distances.is_empty() {
            return Err(EngineError::Config("probe distances are empty".to_string()));
        }
        let increasing = self
            .probe_distances
            .windows(2)
            .all(|pair| pair[0] < pair[1]);
        if !increasing || !(self.probe_distances[0] > 0.0) {
            return Err(EngineError::Config(
                "probe distances must be positive and strictly increasing".to_string(),
            ));
        }
        for (name, value) in [
            ("match_radius", self.match_radius),
            ("max_angle_off_sun", self.max_angle_off_sun),
        ] {
            if !(value > 0.0) {
                return Err(EngineError::Config(format!("{name} must be positive")));
            }
        }
        if !(self.min_caster_height >= 0.0) || !(self.self_exclusion_radius >= 0.0) {
            return Err(EngineError::Config(
                "height and exclusion thresholds must be non-negative".to_string(),
            ));
        }
        if !(self.night_altitude > 0.0) {
            return Err(EngineError::Config(
                "night altitude must be above the horizon".to_string(),
            ));
        }
        if !(self.night_altitude < self.high_sun_altitude) {
            return Err(EngineError::Config(
                "night altitude must be below the high-sun altitude".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.heavy_overcast_factor) {
            return Err(EngineError::Config(
                "heavy overcast factor must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}
