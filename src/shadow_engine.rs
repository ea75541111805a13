use crate::config::EngineConfig;
use crate::spatial_index::{BuildingIndex, METERS_PER_DEGREE};
use crate::types::{Building, ShadowState};
use std::f64::consts::{PI, TAU};

/// Geometry thresholds for the ray march.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowParams {
    pub min_caster_height: f64,
    pub self_exclusion_radius: f64,
    pub match_radius: f64,
    pub max_angle_off_sun: f64,
    pub probe_distances: Vec<f64>,
    pub night_altitude: f64,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ShadowParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            min_caster_height: config.min_caster_height,
            self_exclusion_radius: config.self_exclusion_radius,
            match_radius: config.match_radius,
            max_angle_off_sun: config.max_angle_off_sun,
            probe_distances: config.probe_distances.clone(),
            night_altitude: config.night_altitude,
        }
    }
}

/// Decides whether a point is shadowed by a nearby building.
///
/// Buildings are points with a height. From the venue the engine steps
/// toward the sun at increasing real-world distances, looks up buildings
/// around each probe, and keeps only those lying roughly between the venue
/// and the sun. A building shadows the venue when its shadow
/// (`height / tan(altitude)`) is longer than its distance to the venue.
#[derive(Debug, Clone, Default)]
pub struct ShadowEngine {
    params: ShadowParams,
}

impl ShadowEngine {
    pub fn new(params: ShadowParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(ShadowParams::from(config))
    }

    pub fn params(&self) -> &ShadowParams {
        &self.params
    }

    pub fn is_point_in_shadow(
        &self,
        index: &BuildingIndex,
        point_lat: f64,
        point_lng: f64,
        sun_azimuth_deg: f64,
        sun_altitude_deg: f64,
    ) -> ShadowState {
        // Covers NaN as well: no geometry without a usable sun.
        if !(sun_altitude_deg > self.params.night_altitude) || !sun_azimuth_deg.is_finite() {
            return ShadowState::BELOW_HORIZON;
        }

        let alt_rad = sun_altitude_deg.to_radians();
        let az_rad = sun_azimuth_deg.to_radians().rem_euclid(TAU);
        let tan_alt = alt_rad.tan();

        let meters_to_lat = 1.0 / METERS_PER_DEGREE;
        let meters_to_lng = meters_to_lat / point_lat.to_radians().cos();

        // Per-meter step toward the sun
        let d_lat = az_rad.cos() * meters_to_lat;
        let d_lng = az_rad.sin() * meters_to_lng;

        for &meters in &self.params.probe_distances {
            let probe_lat = point_lat + d_lat * meters;
            let probe_lng = point_lng + d_lng * meters;

            for building in index.query_near(probe_lat, probe_lng, self.params.match_radius) {
                if self.casts_shadow(building, point_lat, point_lng, az_rad, tan_alt) {
                    return ShadowState::BLOCKED;
                }
            }
        }

        ShadowState::LIT
    }

    fn casts_shadow(
        &self,
        building: &Building,
        point_lat: f64,
        point_lng: f64,
        az_rad: f64,
        tan_alt: f64,
    ) -> bool {
        let height = building.height_meters;
        if !(height >= self.params.min_caster_height) {
            return false;
        }

        // Offset from the venue itself, not the probe
        let (north_m, east_m) = offset_meters(point_lat, point_lng, building);
        let distance = north_m.hypot(east_m);
        if distance < self.params.self_exclusion_radius {
            return false;
        }

        let bearing = east_m.atan2(north_m);
        if angle_between(bearing, az_rad) > self.params.max_angle_off_sun {
            return false;
        }

        let shadow_length = height / tan_alt;
        distance < shadow_length
    }
}

/// North/east offset in meters from a point to a building.
fn offset_meters(point_lat: f64, point_lng: f64, building: &Building) -> (f64, f64) {
    let north = (building.latitude - point_lat) * METERS_PER_DEGREE;
    let east =
        (building.longitude - point_lng) * METERS_PER_DEGREE * point_lat.to_radians().cos();
    (north, east)
}

/// Smallest absolute angle between two bearings, in [0, PI].
fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(TAU);
    if diff > PI {
        TAU - diff
    } else {
        diff
    }
}
