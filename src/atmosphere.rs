//! Cloud-cover attenuation of direct sunlight.
//!
//! Layers attenuate independently: low cloud blocks up to 85% of direct
//! light, mid 50%, high cirrus 15%.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

const LOW_BLOCKAGE: f64 = 0.85;
const MID_BLOCKAGE: f64 = 0.50;
const HIGH_BLOCKAGE: f64 = 0.15;

/// Hourly layered cloud cover (percent, 0-100), one entry per hour starting
/// at local midnight of `start_date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyCloudCover {
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub low: Vec<f64>,
    #[serde(default)]
    pub mid: Vec<f64>,
    #[serde(default)]
    pub high: Vec<f64>,
}

impl HourlyCloudCover {
    /// Hours elapsed between the first forecast hour and `local`. Times
    /// before the forecast start map to hour 0.
    pub fn hour_index(&self, local: NaiveDateTime) -> usize {
        let day_offset = self
            .start_date
            .map(|start| (local.date() - start).num_days())
            .unwrap_or(0);
        (day_offset * 24 + local.hour() as i64).max(0) as usize
    }

    pub fn sun_factor_at(&self, local: NaiveDateTime) -> f64 {
        hourly_sun_factor(Some(self), self.hour_index(local))
    }
}

/// Clamp a cover percentage into [0, 100]; NaN counts as clear.
fn sanitize_percent(pct: f64) -> f64 {
    if pct.is_nan() {
        0.0
    } else {
        pct.clamp(0.0, 100.0)
    }
}

/// Fraction of direct sunlight passing through three cloud layers, 1 = clear.
pub fn cloud_sun_factor(low_pct: f64, mid_pct: f64, high_pct: f64) -> f64 {
    let transmittance = (1.0 - sanitize_percent(low_pct) / 100.0 * LOW_BLOCKAGE)
        * (1.0 - sanitize_percent(mid_pct) / 100.0 * MID_BLOCKAGE)
        * (1.0 - sanitize_percent(high_pct) / 100.0 * HIGH_BLOCKAGE);
    transmittance.clamp(0.0, 1.0)
}

/// Sun factor for one forecast hour. Missing data means clear sky; an hour
/// past the end of the series uses the last available hour.
pub fn hourly_sun_factor(hourly: Option<&HourlyCloudCover>, hour: usize) -> f64 {
    let Some(hourly) = hourly else {
        return 1.0;
    };
    if hourly.low.is_empty() && hourly.mid.is_empty() && hourly.high.is_empty() {
        return 1.0;
    }

    let idx = hour.min(hourly.low.len().saturating_sub(1));
    let layer = |values: &[f64]| values.get(idx).copied().unwrap_or(0.0);
    cloud_sun_factor(layer(&hourly.low), layer(&hourly.mid), layer(&hourly.high))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeatherCondition {
    pub label: &'static str,
    pub icon: &'static str,
}

/// Decode a WMO weather interpretation code.
pub fn decode_weather_code(code: u8) -> WeatherCondition {
    let (label, icon) = match code {
        0 => ("Clear", "\u{2600}\u{fe0f}"),
        1 => ("Mostly Clear", "\u{1f324}\u{fe0f}"),
        2 => ("Partly Cloudy", "\u{26c5}"),
        3 => ("Overcast", "\u{2601}\u{fe0f}"),
        45..=48 => ("Foggy", "\u{1f32b}\u{fe0f}"),
        51..=55 => ("Drizzle", "\u{1f326}\u{fe0f}"),
        56..=57 => ("Freezing Drizzle", "\u{1f327}\u{fe0f}"),
        61..=65 => ("Rain", "\u{1f327}\u{fe0f}"),
        66..=67 => ("Freezing Rain", "\u{1f327}\u{fe0f}"),
        71..=77 => ("Snow", "\u{2744}\u{fe0f}"),
        80..=82 => ("Showers", "\u{1f327}\u{fe0f}"),
        85..=86 => ("Snow Showers", "\u{2744}\u{fe0f}"),
        95..=99 => ("Thunderstorm", "\u{26c8}\u{fe0f}"),
        _ => ("Unknown", "\u{1f321}\u{fe0f}"),
    };
    WeatherCondition { label, icon }
}
