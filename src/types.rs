use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A building reduced to its footprint centroid plus a height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Building {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    #[serde(rename = "height")]
    pub height_meters: f64,
}

impl Building {
    pub fn new(latitude: f64, longitude: f64, height_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            height_meters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Venue {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
        }
    }
}

/// Sun position for one instant. Azimuth is compass degrees (0 = north,
/// clockwise); altitude is degrees above the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunPosition {
    pub azimuth_degrees: f64,
    pub altitude_degrees: f64,
    pub timestamp: DateTime<Utc>,
}

impl SunPosition {
    pub fn is_up(&self) -> bool {
        self.altitude_degrees > 0.0
    }
}

/// Outcome of a single shadow probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShadowState {
    pub in_shadow: bool,
    pub blocked_by_building: bool,
}

impl ShadowState {
    pub const LIT: ShadowState = ShadowState {
        in_shadow: false,
        blocked_by_building: false,
    };
    pub const BELOW_HORIZON: ShadowState = ShadowState {
        in_shadow: true,
        blocked_by_building: false,
    };
    pub const BLOCKED: ShadowState = ShadowState {
        in_shadow: true,
        blocked_by_building: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub venue_id: String,
    pub in_sun: bool,
    pub blocked_by_building: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot build a spatial index from zero buildings")]
    EmptyIndex,
    #[error("Invalid building #{index}: {reason}")]
    InvalidBuilding { index: usize, reason: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Unknown timezone: {0}")]
    Timezone(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
