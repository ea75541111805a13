use chrono::{TimeZone, Utc};
use sunlit_patio::spatial_index::meters_to_degree_deltas;
use sunlit_patio::{
    BatchClassifier, Building, BuildingIndex, EngineConfig, IndexSlot, ReclassificationScheduler,
    ShadowEngine, SunCalculator, SunTag, Venue,
};

const LAT: f64 = 41.91;
const LNG: f64 = -87.635;

fn at(north_m: f64, east_m: f64) -> (f64, f64) {
    let (dlat, dlng) = meters_to_degree_deltas(1.0, LAT);
    (LAT + north_m * dlat, LNG + east_m * dlng)
}

fn building(north_m: f64, east_m: f64, height: f64) -> Building {
    let (lat, lng) = at(north_m, east_m);
    Building::new(lat, lng, height)
}

fn config() -> EngineConfig {
    EngineConfig {
        cpu_cores: Some(2),
        ..EngineConfig::default()
    }
}

/// A grid of venues with towers scattered between them.
fn neighbourhood() -> (BuildingIndex, Vec<Venue>) {
    let mut buildings = Vec::new();
    let mut venues = Vec::new();
    for row in 0..8 {
        for col in 0..8 {
            let (north, east) = (row as f64 * 70.0, col as f64 * 70.0);
            let (lat, lng) = at(north, east);
            venues.push(Venue::new(format!("v{row}-{col}"), lat, lng));
            buildings.push(building(
                north - 35.0,
                east + 10.0,
                10.0 + ((row * 8 + col) % 7) as f64 * 12.0,
            ));
        }
    }
    (BuildingIndex::build(buildings).unwrap(), venues)
}

#[test]
fn tower_south_of_venue_depends_on_altitude() {
    let index = BuildingIndex::build(vec![building(-50.0, 0.0, 60.0)]).unwrap();
    let engine = ShadowEngine::from_config(&config());

    let low = engine.is_point_in_shadow(&index, LAT, LNG, 180.0, 30.0);
    assert!(low.in_shadow && low.blocked_by_building);

    let high = engine.is_point_in_shadow(&index, LAT, LNG, 180.0, 60.0);
    assert!(!high.in_shadow && !high.blocked_by_building);
}

#[test]
fn fast_paths_ignore_building_data() {
    let (index, venues) = neighbourhood();
    let classifier = BatchClassifier::new(&config());

    for altitude in [-20.0, 0.0, 0.99, 1.0] {
        let results = classifier.classify_all(Some(&index), &venues, 135.0, altitude);
        assert_eq!(results.len(), venues.len());
        assert!(results.values().all(|r| !r.in_sun && !r.blocked_by_building));
    }
    for altitude in [70.01, 80.0, 90.0] {
        let results = classifier.classify_all(Some(&index), &venues, 135.0, altitude);
        assert!(results.values().all(|r| r.in_sun));
    }
}

#[test]
fn mid_altitude_mixes_sun_and_shade_deterministically() {
    let (index, venues) = neighbourhood();
    let classifier = BatchClassifier::new(&config());

    let first = classifier.classify_all(Some(&index), &venues, 180.0, 20.0);
    assert!(first.values().any(|r| r.in_sun));
    assert!(first.values().any(|r| !r.in_sun && r.blocked_by_building));
    assert!(first.values().all(|r| r.in_sun != r.blocked_by_building));

    for _ in 0..3 {
        assert_eq!(classifier.classify_all(Some(&index), &venues, 180.0, 20.0), first);
    }
}

#[test]
fn cloud_override_keeps_geometry_flag() {
    let (index, venues) = neighbourhood();
    let classifier = BatchClassifier::new(&config());
    let sun = SunCalculator::from_config(&config())
        .get_position(&Utc.with_ymd_and_hms(2024, 9, 10, 21, 0, 0).unwrap());
    assert!(sun.altitude_degrees > 1.0 && sun.altitude_degrees < 70.0);

    let clear = classifier.classify_venues(Some(&index), &venues, &sun, 0.9);
    let overcast = classifier.classify_venues(Some(&index), &venues, &sun, 0.1);

    assert_eq!(overcast.summary.sun_count, 0);
    for (c, o) in clear.statuses.iter().zip(&overcast.statuses) {
        assert_eq!(c.venue_id, o.venue_id);
        assert_eq!(c.blocked_by_building, o.blocked_by_building);
        let expected = if o.blocked_by_building {
            SunTag::OvercastAndShaded
        } else {
            SunTag::Overcast
        };
        assert_eq!(o.tag, expected);
    }
}

#[test]
fn scheduler_runs_full_pipeline() {
    let (index, venues) = neighbourhood();
    let slot = IndexSlot::new();
    slot.publish(index);

    let mut scheduler = ReclassificationScheduler::new(&config(), slot);
    scheduler.set_venues(venues.clone());

    // 21:30 CDT, after sunset
    scheduler.request(Utc.with_ymd_and_hms(2024, 7, 2, 2, 30, 0).unwrap());
    let night = scheduler.run_frame().unwrap();
    assert_eq!(night.summary.shade_count, venues.len());
    assert!(night.statuses.iter().all(|s| s.tag == SunTag::AfterSunset));

    // 16:00 CDT
    scheduler.request(Utc.with_ymd_and_hms(2024, 7, 1, 21, 0, 0).unwrap());
    let day = scheduler.run_frame().unwrap();
    assert_eq!(day.statuses.len(), venues.len());
    assert!(day.summary.sun_count > 0);
}
