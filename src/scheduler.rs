//! Frame-coalesced reclassification.
//!
//! Clock updates may arrive many times per frame while the user scrubs.
//! Requests only record the latest instant; the classification pass runs
//! at most once per frame, and only when the observer's wall-clock minute,
//! the building index, or the venue/weather inputs actually changed.

use crate::atmosphere::HourlyCloudCover;
use crate::classifier::{BatchClassifier, ClassificationReport};
use crate::config::EngineConfig;
use crate::spatial_index::BuildingIndex;
use crate::sun_position::SunCalculator;
use crate::types::{Building, EngineError, Venue};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shared handle to the current building index. Readers get an `Arc`
/// snapshot; publishing swaps the whole index.
#[derive(Debug, Clone, Default)]
pub struct IndexSlot {
    inner: Arc<RwLock<Option<Arc<BuildingIndex>>>>,
}

impl IndexSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<BuildingIndex>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn publish(&self, index: BuildingIndex) {
        let index = Arc::new(index);
        tracing::info!(buildings = index.len(), "publishing building index");
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(index);
    }

    /// Build off-lock, then swap. An empty building set clears the slot.
    pub fn publish_buildings(&self, buildings: Vec<Building>) -> Result<(), EngineError> {
        match BuildingIndex::build(buildings) {
            Ok(index) => {
                self.publish(index);
                Ok(())
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunKey {
    date: NaiveDate,
    minute: u32,
}

struct LastRun {
    key: RunKey,
    index: Arc<BuildingIndex>,
}

pub struct ReclassificationScheduler {
    classifier: BatchClassifier,
    sun: SunCalculator,
    index: IndexSlot,
    venues: Arc<Vec<Venue>>,
    weather: Option<HourlyCloudCover>,
    pending: Option<DateTime<Utc>>,
    current: Option<DateTime<Utc>>,
    last_run: Option<LastRun>,
    inputs_dirty: bool,
    runs: u64,
}

impl ReclassificationScheduler {
    pub fn new(config: &EngineConfig, index: IndexSlot) -> Self {
        Self {
            classifier: BatchClassifier::new(config),
            sun: SunCalculator::from_config(config),
            index,
            venues: Arc::new(Vec::new()),
            weather: None,
            pending: None,
            current: None,
            last_run: None,
            inputs_dirty: true,
            runs: 0,
        }
    }

    pub fn index_slot(&self) -> &IndexSlot {
        &self.index
    }

    pub fn set_venues(&mut self, venues: Vec<Venue>) {
        self.venues = Arc::new(venues);
        self.inputs_dirty = true;
    }

    pub fn set_weather(&mut self, weather: Option<HourlyCloudCover>) {
        self.weather = weather;
        self.inputs_dirty = true;
    }

    /// Record the latest simulated instant. Returns `true` when this request
    /// needs a new frame, `false` when one is already pending.
    pub fn request(&mut self, instant: DateTime<Utc>) -> bool {
        self.pending.replace(instant).is_none()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of classification passes actually run.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    fn run_key(&self, instant: &DateTime<Utc>) -> RunKey {
        RunKey {
            date: self.sun.local_date(instant),
            minute: self.sun.local_minute_of_day(instant),
        }
    }

    fn cloud_sun_factor(&self, instant: &DateTime<Utc>) -> f64 {
        match &self.weather {
            Some(weather) => {
                let local = instant.with_timezone(&self.sun.timezone()).naive_local();
                weather.sun_factor_at(local)
            }
            None => 1.0,
        }
    }

    /// Run at most one classification for everything requested since the
    /// previous frame. `None` when nothing changed or inputs are missing.
    pub fn run_frame(&mut self) -> Option<ClassificationReport> {
        if let Some(instant) = self.pending.take() {
            self.current = Some(instant);
        }
        let instant = self.current?;
        if self.venues.is_empty() {
            return None;
        }
        let index = self.index.current()?;

        let key = self.run_key(&instant);
        let unchanged = self
            .last_run
            .as_ref()
            .is_some_and(|last| last.key == key && Arc::ptr_eq(&last.index, &index));
        if unchanged && !self.inputs_dirty {
            return None;
        }

        let sun = self.sun.get_position(&instant);
        let cloud_sun_factor = self.cloud_sun_factor(&instant);
        let report =
            self.classifier
                .classify_venues(Some(&index), &self.venues, &sun, cloud_sun_factor);

        tracing::debug!(
            minute = key.minute,
            venues = self.venues.len(),
            sun_count = report.summary.sun_count,
            "reclassified venues"
        );

        self.last_run = Some(LastRun { key, index });
        self.inputs_dirty = false;
        self.runs += 1;
        Some(report)
    }
}

fn request_locked(scheduler: &Mutex<ReclassificationScheduler>, instant: DateTime<Utc>) {
    scheduler
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .request(instant);
}

fn run_frame_locked(scheduler: &Mutex<ReclassificationScheduler>) -> Option<ClassificationReport> {
    scheduler
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .run_frame()
}

/// Run a pass on the blocking pool so the CPU-bound work and the held lock
/// stay off the async workers.
async fn run_frame_blocking(
    scheduler: &Arc<Mutex<ReclassificationScheduler>>,
) -> Option<ClassificationReport> {
    let scheduler = Arc::clone(scheduler);
    match tokio::task::spawn_blocking(move || run_frame_locked(&scheduler)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(error = %e, "classification pass failed");
            None
        }
    }
}

/// Drive a scheduler from a watch channel of simulated instants, running at
/// most one pass per `frame`. Reports are published on the returned
/// channel; the loop ends when the clock sender or every report receiver is
/// dropped.
pub fn spawn_frame_loop(
    scheduler: Arc<Mutex<ReclassificationScheduler>>,
    mut clock: watch::Receiver<DateTime<Utc>>,
    frame: std::time::Duration,
) -> (
    JoinHandle<()>,
    watch::Receiver<Option<Arc<ClassificationReport>>>,
) {
    let (tx, rx) = watch::channel(None);

    let handle = tokio::spawn(async move {
        let initial = *clock.borrow_and_update();
        request_locked(&scheduler, initial);

        let mut ticker = tokio::time::interval(frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = clock.changed() => {
                    if changed.is_err() {
                        if let Some(report) = run_frame_blocking(&scheduler).await {
                            let _ = tx.send(Some(Arc::new(report)));
                        }
                        break;
                    }
                    let instant = *clock.borrow_and_update();
                    request_locked(&scheduler, instant);
                }
                _ = ticker.tick() => {
                    if let Some(report) = run_frame_blocking(&scheduler).await {
                        if tx.send(Some(Arc::new(report))).is_err() {
                            break;
                        }
                    }
                }
            }
        }
        tracing::debug!("frame loop stopped");
    });

    (handle, rx)
}
