//! Sanitising raw building records into shadow casters.

use crate::types::{Building, EngineError};
use geo::algorithm::centroid::Centroid;
use geo_types::{LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Height per storey when only `building:levels` is tagged.
pub const METERS_PER_LEVEL: f64 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCenter {
    pub lat: f64,
    pub lon: f64,
}

/// A building as delivered by a map-data feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBuilding {
    #[serde(default)]
    pub center: Option<RawCenter>,
    /// Footprint ring as `[lng, lat]` pairs.
    #[serde(default)]
    pub footprint: Vec<[f64; 2]>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub buildings: Vec<Building>,
    /// Malformed records (bad coordinates, negative or NaN height).
    pub rejected: usize,
    /// Valid records too short to cast a shadow.
    pub below_threshold: usize,
}

/// Height from `height` (leading number, in meters), else the integer part
/// of `building:levels`, else 0.
pub fn estimate_height(tags: &HashMap<String, String>) -> f64 {
    if let Some(height) = tags.get("height").and_then(|raw| leading_float(raw)) {
        return height;
    }
    tags.get("building:levels")
        .and_then(|raw| leading_integer(raw))
        .map(|levels| levels as f64 * METERS_PER_LEVEL)
        .unwrap_or(0.0)
}

fn digits_end(bytes: &[u8], start: usize) -> usize {
    start
        + bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
}

/// Leading decimal number of a tag value; "12 ft" reads as 12.
fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let mut end = digits_end(bytes, sign);
    let mut digits = end - sign;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_end(bytes, end + 1);
        digits += frac_end - end - 1;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_start = end + 1 + exp_sign;
        let exp_end = digits_end(bytes, exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// Leading integer of a tag value; "3.5" reads as 3.
fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let end = digits_end(bytes, sign);
    if end == sign {
        return None;
    }
    s[..end].parse().ok()
}

fn footprint_centroid(footprint: &[[f64; 2]]) -> Option<(f64, f64)> {
    if footprint.is_empty() {
        return None;
    }
    let ring: LineString<f64> = footprint.iter().map(|c| (c[0], c[1])).collect();
    let polygon = Polygon::new(ring, vec![]);
    polygon.centroid().map(|point| (point.y(), point.x()))
}

/// Reject a building whose coordinates or height cannot enter the geometry.
pub fn validate_building(index: usize, building: &Building) -> Result<(), EngineError> {
    let invalid = |reason: String| EngineError::InvalidBuilding { index, reason };

    if !building.latitude.is_finite() || !(-90.0..=90.0).contains(&building.latitude) {
        return Err(invalid(format!("latitude {} out of range", building.latitude)));
    }
    if !building.longitude.is_finite() || !(-180.0..=180.0).contains(&building.longitude) {
        return Err(invalid(format!("longitude {} out of range", building.longitude)));
    }
    if building.height_meters.is_nan() {
        return Err(invalid("height is NaN".to_string()));
    }
    if building.height_meters < 0.0 {
        return Err(invalid(format!("negative height {}", building.height_meters)));
    }
    if building.height_meters.is_infinite() {
        return Err(invalid("height is infinite".to_string()));
    }
    Ok(())
}

/// Keep valid buildings at or above `min_height`.
pub fn sanitize_buildings(
    buildings: impl IntoIterator<Item = Building>,
    min_height: f64,
) -> IngestReport {
    let mut report = IngestReport::default();
    for (index, building) in buildings.into_iter().enumerate() {
        if let Err(e) = validate_building(index, &building) {
            tracing::warn!(error = %e, "rejecting building");
            report.rejected += 1;
            continue;
        }
        if building.height_meters < min_height {
            report.below_threshold += 1;
            continue;
        }
        report.buildings.push(building);
    }

    tracing::info!(
        kept = report.buildings.len(),
        rejected = report.rejected,
        below_threshold = report.below_threshold,
        "ingested buildings"
    );
    report
}

pub fn ingest(raw: &[RawBuilding], min_height: f64) -> IngestReport {
    let mut missing_location = 0;
    let located: Vec<Building> = raw
        .iter()
        .filter_map(|record| {
            let location = record
                .center
                .map(|c| (c.lat, c.lon))
                .or_else(|| footprint_centroid(&record.footprint));
            if location.is_none() {
                missing_location += 1;
            }
            location.map(|(lat, lng)| Building::new(lat, lng, estimate_height(&record.tags)))
        })
        .collect();

    let mut report = sanitize_buildings(located, min_height);
    report.rejected += missing_location;
    report
}

/// Parse a JSON array of `{lat, lng, height}` records.
pub fn parse_buildings_json(json: &str, min_height: f64) -> Result<IngestReport, EngineError> {
    let buildings: Vec<Building> = serde_json::from_str(json)?;
    Ok(sanitize_buildings(buildings, min_height))
}
