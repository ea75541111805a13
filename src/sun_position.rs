use crate::config::EngineConfig;
use crate::types::SunPosition;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Zenith angle of the sun's upper limb at sunrise/sunset, refraction included.
const SUNRISE_ZENITH: f64 = 90.833;
/// Golden hour ends/starts when the sun is 6 degrees up.
const GOLDEN_HOUR_ZENITH: f64 = 84.0;

/// Solar position for a fixed observer. All wall-clock conversions use the
/// observer's timezone, never the host's.
#[derive(Debug, Clone, Copy)]
pub struct SunCalculator {
    latitude: f64,
    longitude: f64,
    timezone: Tz,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunTimes {
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub solar_noon: DateTime<Utc>,
    pub golden_hour_end: Option<DateTime<Utc>>,
    pub golden_hour: Option<DateTime<Utc>>,
}

/// Cosmetic lighting attributes derived from altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lighting {
    pub color: &'static str,
    pub intensity: f64,
}

struct SolarParams {
    declination: f64,
    equation_of_time: f64,
}

impl SunCalculator {
    pub fn new(latitude: f64, longitude: f64, timezone: Tz) -> Self {
        Self {
            latitude,
            longitude,
            timezone,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.observer_lat, config.observer_lng, config.timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn get_position(&self, datetime: &DateTime<Utc>) -> SunPosition {
        let (azimuth, altitude) = self.calculate_position(datetime);
        SunPosition {
            azimuth_degrees: azimuth,
            altitude_degrees: altitude,
            timestamp: *datetime,
        }
    }

    pub fn is_sun_up(&self, datetime: &DateTime<Utc>) -> bool {
        self.get_position(datetime).is_up()
    }

    fn calculate_position(&self, datetime: &DateTime<Utc>) -> (f64, f64) {
        let params = solar_params(julian_century(julian_day(datetime)));

        let utc_minutes = datetime.num_seconds_from_midnight() as f64 / 60.0;
        let true_solar_time = utc_minutes + params.equation_of_time + 4.0 * self.longitude;
        let hour_angle = true_solar_time / 4.0 - 180.0;

        let lat_rad = self.latitude.to_radians();
        let dec_rad = params.declination.to_radians();
        let hour_rad = hour_angle.to_radians();

        let sin_altitude = (lat_rad.sin() * dec_rad.sin()
            + lat_rad.cos() * dec_rad.cos() * hour_rad.cos())
        .clamp(-1.0, 1.0);
        let altitude = sin_altitude.asin();

        // Measured from south, westward; shifted to compass bearing below.
        let azimuth_from_south = hour_rad
            .sin()
            .atan2(hour_rad.cos() * lat_rad.sin() - dec_rad.tan() * lat_rad.cos());
        let azimuth = (azimuth_from_south.to_degrees() + 180.0).rem_euclid(360.0);

        (azimuth, altitude.to_degrees())
    }

    /// Sunrise, sunset, solar noon and golden-hour bounds for a local date.
    pub fn sun_times(&self, date: NaiveDate) -> SunTimes {
        let midnight_utc = date.and_time(NaiveTime::default()).and_utc();
        let noon_estimate = midnight_utc + Duration::hours(12);
        let params = solar_params(julian_century(julian_day(&noon_estimate)));

        let noon_minutes = 720.0 - 4.0 * self.longitude - params.equation_of_time;
        let at = |minutes: f64| midnight_utc + Duration::seconds((minutes * 60.0).round() as i64);
        let event = |zenith: f64, sign: f64| {
            self.hour_angle(zenith, params.declination)
                .map(|ha| at(noon_minutes + sign * 4.0 * ha))
        };

        SunTimes {
            sunrise: event(SUNRISE_ZENITH, -1.0),
            sunset: event(SUNRISE_ZENITH, 1.0),
            solar_noon: at(noon_minutes),
            golden_hour_end: event(GOLDEN_HOUR_ZENITH, -1.0),
            golden_hour: event(GOLDEN_HOUR_ZENITH, 1.0),
        }
    }

    /// Hour angle (degrees) at which the sun crosses `zenith`, or `None`
    /// during polar day/night.
    fn hour_angle(&self, zenith: f64, declination: f64) -> Option<f64> {
        let lat_rad = self.latitude.to_radians();
        let dec_rad = declination.to_radians();
        let cos_ha = zenith.to_radians().cos() / (lat_rad.cos() * dec_rad.cos())
            - lat_rad.tan() * dec_rad.tan();
        if !(-1.0..=1.0).contains(&cos_ha) {
            return None;
        }
        Some(cos_ha.acos().to_degrees())
    }

    pub fn local_date(&self, datetime: &DateTime<Utc>) -> NaiveDate {
        datetime.with_timezone(&self.timezone).date_naive()
    }

    /// Minute of day (0-1439) on the observer's wall clock.
    pub fn local_minute_of_day(&self, datetime: &DateTime<Utc>) -> u32 {
        let local = datetime.with_timezone(&self.timezone);
        local.hour() * 60 + local.minute()
    }

    pub fn sunrise_minute(&self, datetime: &DateTime<Utc>) -> Option<u32> {
        self.sun_times(self.local_date(datetime))
            .sunrise
            .map(|t| self.local_minute_of_day(&t))
    }

    pub fn sunset_minute(&self, datetime: &DateTime<Utc>) -> Option<u32> {
        self.sun_times(self.local_date(datetime))
            .sunset
            .map(|t| self.local_minute_of_day(&t))
    }

    /// Local noon of `date`, as a UTC instant.
    pub fn local_noon(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let noon = date.and_hms_opt(12, 0, 0)?;
        self.timezone
            .from_local_datetime(&noon)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }
}

fn julian_day(datetime: &DateTime<Utc>) -> f64 {
    datetime.timestamp_millis() as f64 / 86_400_000.0 + 2_440_587.5
}

fn julian_century(julian_day: f64) -> f64 {
    (julian_day - 2_451_545.0) / 36_525.0
}

fn solar_params(jc: f64) -> SolarParams {
    let l0 = (280.46646 + jc * (36000.76983 + 0.0003032 * jc)).rem_euclid(360.0);
    let m = 357.52911 + jc * (35999.05029 - 0.0001537 * jc);
    let m_rad = m.to_radians();
    let e = 0.016708634 - jc * (0.000042037 + 0.0000001267 * jc);

    let center = m_rad.sin() * (1.914602 - jc * (0.004817 + 0.000014 * jc))
        + (2.0 * m_rad).sin() * (0.019993 - 0.000101 * jc)
        + (3.0 * m_rad).sin() * 0.000289;

    let omega = (125.04 - 1934.136 * jc).to_radians();
    let apparent_lon = (l0 + center - 0.00569 - 0.00478 * omega.sin()).to_radians();

    let obliquity_mean = 23.0
        + (26.0 + (21.448 - jc * (46.815 + jc * (0.00059 - jc * 0.001813))) / 60.0) / 60.0;
    let obliquity = (obliquity_mean + 0.00256 * omega.cos()).to_radians();

    let declination = (obliquity.sin() * apparent_lon.sin()).asin().to_degrees();

    let y = (obliquity / 2.0).tan().powi(2);
    let l0_rad = l0.to_radians();
    let equation_of_time = 4.0
        * (y * (2.0 * l0_rad).sin() - 2.0 * e * m_rad.sin()
            + 4.0 * e * y * m_rad.sin() * (2.0 * l0_rad).cos()
            - 0.5 * y * y * (4.0 * l0_rad).sin()
            - 1.25 * e * e * (2.0 * m_rad).sin())
        .to_degrees();

    SolarParams {
        declination,
        equation_of_time,
    }
}

pub fn lighting_for_altitude(altitude_degrees: f64) -> Lighting {
    let color = match altitude_degrees {
        a if a < 0.0 => "#1a1a3e",
        a if a < 6.0 => "#ff6b35",
        a if a < 12.0 => "#ffa040",
        a if a < 25.0 => "#ffc850",
        _ => "#ffe8b0",
    };
    let intensity = match altitude_degrees {
        a if a < 0.0 => 0.0,
        a if a < 10.0 => 0.3,
        a if a < 30.0 => 0.5,
        _ => 0.6,
    };
    Lighting { color, intensity }
}

/// `"h:mm AM"` style label for a minute of day.
pub fn format_minute_of_day(minutes: u32) -> String {
    let hours = (minutes / 60) % 24;
    let mins = minutes % 60;
    let suffix = if hours >= 12 { "PM" } else { "AM" };
    let h12 = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{h12}:{mins:02} {suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_OBSERVER_LAT, DEFAULT_OBSERVER_LNG};

    fn chicago() -> SunCalculator {
        SunCalculator::new(
            DEFAULT_OBSERVER_LAT,
            DEFAULT_OBSERVER_LNG,
            chrono_tz::America::Chicago,
        )
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn summer_solstice_noon_is_high_and_south() {
        // 12:50 CDT
        let pos = chicago().get_position(&utc(2024, 6, 21, 17, 50));
        assert!((pos.altitude_degrees - 71.5).abs() < 1.0, "{pos:?}");
        assert!((pos.azimuth_degrees - 180.0).abs() < 5.0, "{pos:?}");
    }

    #[test]
    fn morning_sun_is_east_and_evening_sun_is_west() {
        let calc = chicago();
        // 08:00 and 18:00 CDT
        let morning = calc.get_position(&utc(2024, 6, 21, 13, 0));
        let evening = calc.get_position(&utc(2024, 6, 21, 23, 0));
        assert!(morning.azimuth_degrees > 45.0 && morning.azimuth_degrees < 135.0);
        assert!(evening.azimuth_degrees > 225.0 && evening.azimuth_degrees < 315.0);
        assert!(morning.is_up() && evening.is_up());
    }

    #[test]
    fn midnight_sun_is_down() {
        let calc = chicago();
        let midnight = utc(2024, 6, 22, 5, 0);
        assert!(!calc.is_sun_up(&midnight));
        assert!(calc.get_position(&midnight).altitude_degrees < 0.0);
    }

    #[test]
    fn sunrise_and_sunset_minutes_use_observer_zone() {
        let calc = chicago();
        let instant = utc(2024, 6, 21, 17, 0);
        // Chicago solstice: sunrise ~5:15 CDT, sunset ~8:29 PM CDT.
        let sunrise = calc.sunrise_minute(&instant).unwrap();
        let sunset = calc.sunset_minute(&instant).unwrap();
        assert!((sunrise as i64 - 315).abs() <= 6, "sunrise {sunrise}");
        assert!((sunset as i64 - 1709).abs() <= 6, "sunset {sunset}");
    }

    #[test]
    fn winter_times_follow_standard_time() {
        let calc = chicago();
        // Winter solstice: sunrise ~7:15 CST, sunset ~4:22 PM CST.
        let times = calc.sun_times(NaiveDate::from_ymd_opt(2024, 12, 21).unwrap());
        let sunrise = calc.local_minute_of_day(&times.sunrise.unwrap());
        let sunset = calc.local_minute_of_day(&times.sunset.unwrap());
        assert!((sunrise as i64 - 435).abs() <= 6, "sunrise {sunrise}");
        assert!((sunset as i64 - 982).abs() <= 6, "sunset {sunset}");
    }

    #[test]
    fn golden_hour_sits_inside_daylight() {
        let times = chicago().sun_times(NaiveDate::from_ymd_opt(2024, 6, 21).unwrap());
        let (sunrise, sunset) = (times.sunrise.unwrap(), times.sunset.unwrap());
        let (gh_end, gh) = (times.golden_hour_end.unwrap(), times.golden_hour.unwrap());
        assert!(sunrise < gh_end && gh_end < times.solar_noon);
        assert!(times.solar_noon < gh && gh < sunset);
    }

    #[test]
    fn polar_night_has_no_sunrise() {
        let calc = SunCalculator::new(78.22, 15.65, chrono_tz::Arctic::Longyearbyen);
        let times = calc.sun_times(NaiveDate::from_ymd_opt(2024, 12, 21).unwrap());
        assert!(times.sunrise.is_none() && times.sunset.is_none());
    }

    #[test]
    fn lighting_bands() {
        assert_eq!(lighting_for_altitude(-3.0).intensity, 0.0);
        assert_eq!(lighting_for_altitude(3.0).color, "#ff6b35");
        assert_eq!(lighting_for_altitude(8.0).color, "#ffa040");
        assert_eq!(lighting_for_altitude(8.0).intensity, 0.3);
        assert_eq!(lighting_for_altitude(20.0).color, "#ffc850");
        assert_eq!(lighting_for_altitude(45.0).color, "#ffe8b0");
        assert_eq!(lighting_for_altitude(45.0).intensity, 0.6);
    }

    #[test]
    fn formats_twelve_hour_clock() {
        assert_eq!(format_minute_of_day(0), "12:00 AM");
        assert_eq!(format_minute_of_day(315), "5:15 AM");
        assert_eq!(format_minute_of_day(720), "12:00 PM");
        assert_eq!(format_minute_of_day(1439), "11:59 PM");
    }
}
