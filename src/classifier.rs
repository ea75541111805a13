use crate::config::EngineConfig;
use crate::shadow_engine::ShadowEngine;
use crate::spatial_index::BuildingIndex;
use crate::types::{ClassificationResult, SunPosition, Venue};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Human-readable reason a venue is in sun or shade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SunTag {
    AfterSunset,
    Overcast,
    OvercastAndShaded,
    MostlyCloudy,
    FilteredSun,
    DirectSunlight,
    AfternoonSun,
    GoldenHour,
    BlockedByBuilding,
    SunTooLow,
}

impl fmt::Display for SunTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SunTag::AfterSunset => "\u{1f319} After Sunset",
            SunTag::Overcast => "\u{2601}\u{fe0f} Overcast",
            SunTag::OvercastAndShaded => "\u{2601}\u{fe0f} Overcast & Shaded",
            SunTag::MostlyCloudy => "\u{1f325}\u{fe0f} Mostly Cloudy",
            SunTag::FilteredSun => "\u{26c5} Filtered Sun",
            SunTag::DirectSunlight => "\u{2600}\u{fe0f} Direct Sunlight",
            SunTag::AfternoonSun => "\u{2600}\u{fe0f} Afternoon Sun",
            SunTag::GoldenHour => "\u{1f305} Golden Hour",
            SunTag::BlockedByBuilding => "\u{1f3e2} Blocked by Building",
            SunTag::SunTooLow => "\u{1f305} Sun Too Low",
        };
        f.write_str(label)
    }
}

/// Pick a tag. Precedence: night, heavy overcast, partial overcast, sun
/// bands, building-blocked, sun too low.
///
/// `heavy_overcast_factor` must match the threshold used for the cloud
/// override, so every venue flipped to shade is tagged overcast.
pub fn sun_tag(
    in_sun: bool,
    blocked_by_building: bool,
    altitude_degrees: f64,
    sun_up: bool,
    cloud_sun_factor: Option<f64>,
    heavy_overcast_factor: f64,
) -> SunTag {
    if !sun_up {
        return SunTag::AfterSunset;
    }

    if let Some(factor) = cloud_sun_factor {
        if factor < heavy_overcast_factor {
            return if blocked_by_building {
                SunTag::OvercastAndShaded
            } else {
                SunTag::Overcast
            };
        }
        if factor < 0.5 {
            return SunTag::MostlyCloudy;
        }
        if factor < 0.8 {
            return SunTag::FilteredSun;
        }
    }

    if in_sun {
        if altitude_degrees > 25.0 {
            return SunTag::DirectSunlight;
        }
        if altitude_degrees > 12.0 {
            return SunTag::AfternoonSun;
        }
        if altitude_degrees >= 1.0 {
            return SunTag::GoldenHour;
        }
    }

    if blocked_by_building && altitude_degrees > 1.0 {
        return SunTag::BlockedByBuilding;
    }
    if altitude_degrees <= 6.0 {
        return SunTag::SunTooLow;
    }
    SunTag::BlockedByBuilding
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueStatus {
    pub venue_id: String,
    pub in_sun: bool,
    pub blocked_by_building: bool,
    pub tag: SunTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClassificationSummary {
    pub sun_count: usize,
    pub shade_count: usize,
}

/// Output of one full classification pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub instant: DateTime<Utc>,
    pub sun: SunPosition,
    pub cloud_sun_factor: f64,
    pub statuses: Vec<VenueStatus>,
    pub summary: ClassificationSummary,
}

/// Runs the shadow engine across a venue collection.
pub struct BatchClassifier {
    engine: ShadowEngine,
    high_sun_altitude: f64,
    heavy_overcast_factor: f64,
    pool: Option<rayon::ThreadPool>,
}

impl BatchClassifier {
    pub fn new(config: &EngineConfig) -> Self {
        let cpu_cores = config.get_cpu_cores();
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(cpu_cores)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "failed to build classifier thread pool; using global pool");
                None
            }
        };

        Self {
            engine: ShadowEngine::from_config(config),
            high_sun_altitude: config.high_sun_altitude,
            heavy_overcast_factor: config.heavy_overcast_factor,
            pool,
        }
    }

    pub fn engine(&self) -> &ShadowEngine {
        &self.engine
    }

    /// Geometric sun/shade for every venue, keyed by venue id.
    ///
    /// Without an index nothing can prove a shadow, so every venue is sunny
    /// once the sun is above the night threshold.
    pub fn classify_all(
        &self,
        index: Option<&BuildingIndex>,
        venues: &[Venue],
        sun_azimuth_deg: f64,
        sun_altitude_deg: f64,
    ) -> BTreeMap<String, ClassificationResult> {
        let night_altitude = self.engine.params().night_altitude;

        if !(sun_altitude_deg > night_altitude) {
            tracing::debug!(sun_altitude_deg, "sun below night threshold; all venues shaded");
            return uniform(venues, false);
        }
        if sun_altitude_deg > self.high_sun_altitude {
            tracing::debug!(sun_altitude_deg, "near-vertical sun; all venues sunny");
            return uniform(venues, true);
        }
        let Some(index) = index else {
            tracing::debug!("no building index; defaulting venues to sunny");
            return uniform(venues, true);
        };

        let classify = || {
            venues
                .par_iter()
                .map(|venue| {
                    let state = self.engine.is_point_in_shadow(
                        index,
                        venue.latitude,
                        venue.longitude,
                        sun_azimuth_deg,
                        sun_altitude_deg,
                    );
                    ClassificationResult {
                        venue_id: venue.id.clone(),
                        in_sun: !state.in_shadow,
                        blocked_by_building: state.blocked_by_building,
                    }
                })
                .collect::<Vec<_>>()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(classify),
            None => classify(),
        };

        results
            .into_iter()
            .map(|result| (result.venue_id.clone(), result))
            .collect()
    }

    /// Heavy overcast turns geometric sun into shade. `blocked_by_building`
    /// keeps its geometric value.
    pub fn apply_cloud_cover(
        &self,
        results: &mut BTreeMap<String, ClassificationResult>,
        cloud_sun_factor: f64,
    ) {
        if !(cloud_sun_factor < self.heavy_overcast_factor) {
            return;
        }
        let mut flipped = 0usize;
        for result in results.values_mut().filter(|r| r.in_sun) {
            result.in_sun = false;
            flipped += 1;
        }
        tracing::debug!(cloud_sun_factor, flipped, "heavy overcast override");
    }

    /// Full pass: geometry, cloud override, tags and counts, in venue order.
    pub fn classify_venues(
        &self,
        index: Option<&BuildingIndex>,
        venues: &[Venue],
        sun: &SunPosition,
        cloud_sun_factor: f64,
    ) -> ClassificationReport {
        let statuses: Vec<VenueStatus> = if !sun.is_up() {
            venues
                .iter()
                .map(|venue| VenueStatus {
                    venue_id: venue.id.clone(),
                    in_sun: false,
                    blocked_by_building: false,
                    tag: SunTag::AfterSunset,
                })
                .collect()
        } else {
            let mut results =
                self.classify_all(index, venues, sun.azimuth_degrees, sun.altitude_degrees);
            self.apply_cloud_cover(&mut results, cloud_sun_factor);

            venues
                .iter()
                .map(|venue| {
                    let (in_sun, blocked) = results
                        .get(&venue.id)
                        .map(|r| (r.in_sun, r.blocked_by_building))
                        .unwrap_or((true, false));
                    VenueStatus {
                        venue_id: venue.id.clone(),
                        in_sun,
                        blocked_by_building: blocked,
                        tag: sun_tag(
                            in_sun,
                            blocked,
                            sun.altitude_degrees,
                            true,
                            Some(cloud_sun_factor),
                            self.heavy_overcast_factor,
                        ),
                    }
                })
                .collect()
        };

        let sun_count = statuses.iter().filter(|s| s.in_sun).count();
        let summary = ClassificationSummary {
            sun_count,
            shade_count: statuses.len() - sun_count,
        };

        ClassificationReport {
            instant: sun.timestamp,
            sun: *sun,
            cloud_sun_factor,
            statuses,
            summary,
        }
    }
}

fn uniform(venues: &[Venue], in_sun: bool) -> BTreeMap<String, ClassificationResult> {
    venues
        .iter()
        .map(|venue| {
            let result = ClassificationResult {
                venue_id: venue.id.clone(),
                in_sun,
                blocked_by_building: false,
            };
            (venue.id.clone(), result)
        })
        .collect()
}
