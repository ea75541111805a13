use crate::sun_position::SunCalculator;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

pub const LAST_MINUTE_OF_DAY: u32 = 1439;

/// Autoplay sweeps hour by hour; manual playback goes minute by minute.
pub const AUTOPLAY_STEP_MINUTES: u32 = 60;
pub const MANUAL_STEP_MINUTES: u32 = 1;
pub const AUTOPLAY_TICK: std::time::Duration = std::time::Duration::from_millis(3000);
pub const MANUAL_TICK: std::time::Duration = std::time::Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeState {
    pub instant: DateTime<Utc>,
    pub minute_of_day: u32,
    pub is_playing: bool,
    pub is_night: bool,
}

/// Shift `base` so the observer's wall clock reads `minute`.
pub fn date_from_minute(calc: &SunCalculator, base: DateTime<Utc>, minute: u32) -> DateTime<Utc> {
    let current = calc.local_minute_of_day(&base) as i64;
    base + Duration::minutes(minute as i64 - current)
}

/// The simulated clock the UI scrubs. It never reads wall-clock time; the
/// starting instant is supplied by the caller.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    calc: SunCalculator,
    instant: DateTime<Utc>,
    playing: bool,
    autoplay: bool,
}

impl SimulatedClock {
    pub fn new(calc: SunCalculator, start: DateTime<Utc>) -> Self {
        Self {
            calc,
            instant: start,
            playing: false,
            autoplay: false,
        }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    pub fn minute_of_day(&self) -> u32 {
        self.calc.local_minute_of_day(&self.instant)
    }

    pub fn sunrise_minute(&self) -> u32 {
        self.calc.sunrise_minute(&self.instant).unwrap_or(0)
    }

    pub fn sunset_minute(&self) -> u32 {
        self.calc
            .sunset_minute(&self.instant)
            .unwrap_or(LAST_MINUTE_OF_DAY)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn state(&self) -> TimeState {
        TimeState {
            instant: self.instant,
            minute_of_day: self.minute_of_day(),
            is_playing: self.playing,
            is_night: !self.calc.is_sun_up(&self.instant),
        }
    }

    /// Scrubbing stops any playback.
    pub fn set_minute_of_day(&mut self, minute: i64) {
        self.playing = false;
        self.autoplay = false;
        let minute = minute.clamp(0, LAST_MINUTE_OF_DAY as i64) as u32;
        self.instant = date_from_minute(&self.calc, self.instant, minute);
    }

    /// Move to another day, keeping the wall-clock minute.
    pub fn set_calendar_date(&mut self, date: NaiveDate) {
        let minute = self.minute_of_day();
        if let Some(noon) = self.calc.local_noon(date) {
            self.instant = date_from_minute(&self.calc, noon, minute);
        }
    }

    pub fn start_autoplay(&mut self) {
        self.playing = true;
        self.autoplay = true;
    }

    /// Any interaction ends autoplay.
    pub fn stop_play(&mut self) {
        if self.autoplay {
            self.playing = false;
            self.autoplay = false;
        }
    }

    /// Starting playback jumps to sunrise; playback after a toggle is
    /// always minute by minute.
    pub fn toggle_play(&mut self) {
        self.autoplay = false;
        if !self.playing {
            let sunrise = self.sunrise_minute();
            self.instant = date_from_minute(&self.calc, self.instant, sunrise);
        }
        self.playing = !self.playing;
    }

    /// Advance one step; past sunset, wrap to sunrise and stop.
    pub fn step_forward(&mut self) {
        let step = if self.autoplay {
            AUTOPLAY_STEP_MINUTES
        } else {
            MANUAL_STEP_MINUTES
        };
        let next = self.minute_of_day() + step;
        if next > self.sunset_minute() {
            self.playing = false;
            self.autoplay = false;
            let sunrise = self.sunrise_minute();
            self.instant = date_from_minute(&self.calc, self.instant, sunrise);
            return;
        }
        self.instant = date_from_minute(&self.calc, self.instant, next);
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        if self.autoplay {
            AUTOPLAY_TICK
        } else {
            MANUAL_TICK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use chrono::TimeZone;

    fn clock_at(hour_utc: u32, minute: u32) -> SimulatedClock {
        let calc = SunCalculator::from_config(&EngineConfig::default());
        SimulatedClock::new(
            calc,
            Utc.with_ymd_and_hms(2024, 6, 21, hour_utc, minute, 0).unwrap(),
        )
    }

    #[test]
    fn minute_of_day_is_observer_local() {
        // 17:00 UTC is 12:00 CDT
        assert_eq!(clock_at(17, 0).minute_of_day(), 720);
    }

    #[test]
    fn scrubbing_clamps_and_stops_playback() {
        let mut clock = clock_at(17, 0);
        clock.start_autoplay();
        clock.set_minute_of_day(2000);
        assert_eq!(clock.minute_of_day(), LAST_MINUTE_OF_DAY);
        assert!(!clock.is_playing());
        clock.set_minute_of_day(-5);
        assert_eq!(clock.minute_of_day(), 0);
        assert_eq!(clock.state().instant.date_naive().to_string(), "2024-06-21");
    }

    #[test]
    fn calendar_change_keeps_minute() {
        let mut clock = clock_at(17, 30);
        clock.set_calendar_date(NaiveDate::from_ymd_opt(2024, 12, 24).unwrap());
        assert_eq!(clock.minute_of_day(), 750);
        assert_eq!(
            clock.instant(),
            Utc.with_ymd_and_hms(2024, 12, 24, 18, 30, 0).unwrap()
        );
    }

    #[test]
    fn toggle_play_starts_at_sunrise() {
        let mut clock = clock_at(17, 0);
        clock.toggle_play();
        assert!(clock.is_playing() && !clock.is_autoplay());
        assert_eq!(clock.minute_of_day(), clock.sunrise_minute());
        assert_eq!(clock.tick_interval(), MANUAL_TICK);

        clock.step_forward();
        assert_eq!(clock.minute_of_day(), clock.sunrise_minute() + 1);
    }

    #[test]
    fn stepping_past_sunset_wraps_to_sunrise() {
        let mut clock = clock_at(17, 0);
        let sunset = clock.sunset_minute();
        clock.set_minute_of_day(sunset as i64 - 30);
        clock.start_autoplay();
        assert_eq!(clock.tick_interval(), AUTOPLAY_TICK);
        clock.step_forward();
        assert!(!clock.is_playing());
        assert_eq!(clock.minute_of_day(), clock.sunrise_minute());
    }

    #[test]
    fn night_state_follows_sun() {
        let mut clock = clock_at(17, 0);
        assert!(!clock.state().is_night);
        clock.set_minute_of_day(60);
        assert!(clock.state().is_night);
    }
}
