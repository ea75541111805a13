//! Single-entry cache with an explicit TTL and an injected clock, for
//! collaborators that refresh slow-changing data (buildings, weather).

use chrono::{DateTime, Duration, Utc};
use std::fmt::Display;
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TtlCache<T, C: Clock = SystemClock> {
    clock: C,
    ttl: Duration,
    entry: Option<CacheEntry<T>>,
}

impl<T, C: Clock> TtlCache<T, C> {
    pub fn new(clock: C, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entry: None,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        now - entry.stored_at < self.ttl
    }

    /// The cached value, if younger than the TTL.
    pub fn get(&self) -> Option<&T> {
        let now = self.clock.now();
        self.entry
            .as_ref()
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| &entry.value)
    }

    /// The cached value regardless of age.
    pub fn get_stale(&self) -> Option<&T> {
        self.entry.as_ref().map(|entry| &entry.value)
    }

    pub fn insert(&mut self, value: T) {
        self.entry = Some(CacheEntry {
            value,
            stored_at: self.clock.now(),
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Serve the fresh value, or refresh through `fetch`. A failed refresh
    /// falls back to the stale value when there is one.
    pub fn get_or_refresh<E, F>(&mut self, fetch: F) -> Result<&T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let now = self.clock.now();
        let stale = match self.entry.take() {
            Some(entry) if self.is_fresh(&entry, now) => {
                return Ok(&self.entry.insert(entry).value);
            }
            other => other,
        };

        match fetch() {
            Ok(value) => Ok(&self
                .entry
                .insert(CacheEntry {
                    value,
                    stored_at: now,
                })
                .value),
            Err(err) => match stale {
                Some(entry) => {
                    tracing::warn!(error = %err, "refresh failed; serving stale entry");
                    Ok(&self.entry.insert(entry).value)
                }
                None => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = clock();
        let mut cache = TtlCache::new(clock.clone(), Duration::hours(24));
        cache.insert(vec![1, 2, 3]);
        assert_eq!(cache.get(), Some(&vec![1, 2, 3]));

        clock.advance(Duration::hours(23));
        assert!(cache.get().is_some());

        clock.advance(Duration::hours(1));
        assert!(cache.get().is_none());
        assert_eq!(cache.get_stale(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn refresh_only_when_stale() {
        let clock = clock();
        let mut cache = TtlCache::new(clock.clone(), Duration::minutes(10));
        let mut fetches = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_refresh(|| {
                    fetches += 1;
                    Ok::<_, String>(fetches)
                })
                .unwrap();
            assert_eq!(*value, 1);
        }

        clock.advance(Duration::minutes(11));
        let value = cache
            .get_or_refresh(|| {
                fetches += 1;
                Ok::<_, String>(fetches)
            })
            .unwrap();
        assert_eq!(*value, 2);
    }

    #[test]
    fn failed_refresh_serves_stale_value() {
        let clock = clock();
        let mut cache = TtlCache::new(clock.clone(), Duration::minutes(10));
        cache.insert("old");
        clock.advance(Duration::hours(1));

        let value = cache.get_or_refresh(|| Err::<&str, _>("upstream down")).unwrap();
        assert_eq!(*value, "old");
    }

    #[test]
    fn failed_refresh_without_entry_is_an_error() {
        let mut cache: TtlCache<u32, _> = TtlCache::new(clock(), Duration::minutes(10));
        assert_eq!(
            cache.get_or_refresh(|| Err::<u32, _>("upstream down")),
            Err("upstream down")
        );
    }
}
