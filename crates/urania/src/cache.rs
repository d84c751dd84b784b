//! Memoization of computed chart snapshots.
//!
//! Entries are keyed by (date, optional hour, optional location) and stay
//! fresh while either the day TTL or the hour TTL has not elapsed. Expired
//! entries are swept lazily on every write; there is no background timer.
//! Nothing here is needed for correctness, so a poisoned lock is simply
//! taken over.

use crate::chart::{ChartSnapshot, SourceTag};
use crate::ephemeris::types::{GeoLocation, Instant};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default long TTL, for day-granularity lookups.
pub const DEFAULT_DAY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Default short TTL, for hour-granularity lookups.
pub const DEFAULT_HOUR_TTL: Duration = Duration::from_secs(60 * 60);

/// Location identity rounded to micro-degrees so equal inputs hash equally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LocationKey {
    lat_micro: i64,
    lon_micro: i64,
}

impl LocationKey {
    pub fn from_location(location: &GeoLocation) -> Self {
        Self {
            lat_micro: (location.lat * 1e6).round() as i64,
            lon_micro: (location.lon * 1e6).round() as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub date: NaiveDate,
    pub hour: Option<u8>,
    pub location: Option<LocationKey>,
}

impl CacheKey {
    pub fn new(date: NaiveDate, hour: Option<u8>, location: Option<&GeoLocation>) -> Self {
        Self {
            date,
            hour,
            location: location.map(LocationKey::from_location),
        }
    }

    /// Day-granularity key.
    pub fn daily(date: NaiveDate, location: Option<&GeoLocation>) -> Self {
        Self::new(date, None, location)
    }

    /// Hour-granularity key, only for instants exactly on the hour.
    pub fn for_instant(instant: &Instant) -> Option<Self> {
        let dt = instant.datetime();
        if dt.minute() != 0 || dt.second() != 0 || dt.nanosecond() != 0 {
            return None;
        }
        Some(Self::new(
            dt.date_naive(),
            Some(dt.hour() as u8),
            instant.location().as_ref(),
        ))
    }
}

/// One stored snapshot. Replaced wholesale, never patched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub snapshot: Arc<ChartSnapshot>,
    pub source: SourceTag,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Which TTL still covers an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Hour,
    Day,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryStats {
    pub key: CacheKey,
    pub age: Duration,
    pub freshness: Freshness,
    pub source: SourceTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    /// Sorted by key
    pub entries: Vec<EntryStats>,
}

/// Position cache with two freshness tiers
#[derive(Debug)]
pub struct PositionCache {
    day_ttl: Duration,
    hour_ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl Default for PositionCache {
    fn default() -> Self {
        Self::new(DEFAULT_DAY_TTL, DEFAULT_HOUR_TTL)
    }
}

impl PositionCache {
    pub fn new(day_ttl: Duration, hour_ttl: Duration) -> Self {
        Self {
            day_ttl,
            hour_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn freshness(&self, age: Duration) -> Freshness {
        if age < self.hour_ttl {
            Freshness::Hour
        } else if age < self.day_ttl {
            Freshness::Day
        } else {
            Freshness::Expired
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    /// Fresh entry for `key` as seen at `now`; `None` is a cache miss.
    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        let entries = self.lock();
        match entries.get(key) {
            Some(entry) if self.freshness(entry.age_at(now)) != Freshness::Expired => {
                log::debug!("Position cache hit for {:?}", key);
                Some(entry.clone())
            }
            Some(_) => {
                log::debug!("Position cache entry for {:?} expired", key);
                None
            }
            None => {
                log::debug!("Position cache miss for {:?}", key);
                None
            }
        }
    }

    /// Entry for `key` even if expired, as long as it has not been swept.
    pub fn get_stale(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: CacheKey, snapshot: Arc<ChartSnapshot>, source: SourceTag) {
        self.set_at(key, snapshot, source, Utc::now());
    }

    /// Store an entry created at `now`, then sweep everything past both TTLs.
    pub fn set_at(
        &self,
        key: CacheKey,
        snapshot: Arc<ChartSnapshot>,
        source: SourceTag,
        now: DateTime<Utc>,
    ) {
        let mut entries = self.lock();
        entries.insert(
            key,
            CacheEntry {
                key,
                snapshot,
                source,
                created_at: now,
            },
        );
        let before = entries.len();
        entries.retain(|_, e| self.freshness(e.age_at(now)) != Freshness::Expired);
        let evicted = before - entries.len();
        if evicted > 0 {
            log::debug!("Position cache swept {} expired entries", evicted);
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let entries = self.lock();
        let mut stats: Vec<EntryStats> = entries
            .values()
            .map(|e| {
                let age = e.age_at(now);
                EntryStats {
                    key: e.key,
                    age,
                    freshness: self.freshness(age),
                    source: e.source,
                }
            })
            .collect();
        stats.sort_by_key(|s| s.key);
        CacheStats {
            size: entries.len(),
            entries: stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::HouseSystem;
    use crate::ephemeris::upstream::NormalizedPositions;
    use chrono::TimeZone;

    fn snapshot() -> Arc<ChartSnapshot> {
        let instant = Instant::parse("2020-06-01", "10:00", None).unwrap();
        Arc::new(
            ChartSnapshot::from_normalized(
                instant,
                NormalizedPositions::default(),
                HouseSystem::WholeSign,
            )
            .unwrap(),
        )
    }

    fn key(day: u32) -> CacheKey {
        CacheKey::daily(NaiveDate::from_ymd_opt(2020, 6, day).unwrap(), None)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_for_instant_requires_whole_hour() {
        let on_hour = Instant::parse("2020-06-01", "10:00", None).unwrap();
        let key = CacheKey::for_instant(&on_hour).unwrap();
        assert_eq!(key.hour, Some(10));
        let off_hour = Instant::parse("2020-06-01", "10:30", None).unwrap();
        assert!(CacheKey::for_instant(&off_hour).is_none());
    }

    #[test]
    fn test_location_key_rounds() {
        let a = GeoLocation::new(51.5000001, -0.1).unwrap();
        let b = GeoLocation::new(51.5000004, -0.1).unwrap();
        assert_eq!(LocationKey::from_location(&a), LocationKey::from_location(&b));
    }

    #[test]
    fn test_freshness_tiers() {
        let cache = PositionCache::default();
        cache.set_at(key(1), snapshot(), SourceTag::Primary, t0());
        let at = |mins: i64| t0() + chrono::Duration::minutes(mins);
        assert_eq!(cache.stats_at(at(30)).entries[0].freshness, Freshness::Hour);
        assert_eq!(cache.stats_at(at(120)).entries[0].freshness, Freshness::Day);
        assert_eq!(cache.stats_at(at(24 * 60)).entries[0].freshness, Freshness::Expired);
        assert!(cache.get_at(&key(1), at(120)).is_some());
        assert!(cache.get_at(&key(1), at(24 * 60)).is_none());
        assert!(cache.get_stale(&key(1)).is_some());
    }

    #[test]
    fn test_sweep_on_write() {
        let cache = PositionCache::default();
        cache.set_at(key(1), snapshot(), SourceTag::Primary, t0());
        cache.set_at(key(2), snapshot(), SourceTag::Fallback, t0() + chrono::Duration::hours(2));
        assert_eq!(cache.len(), 2);
        cache.set_at(key(3), snapshot(), SourceTag::Primary, t0() + chrono::Duration::hours(25));
        let stats = cache.stats_at(t0() + chrono::Duration::hours(25));
        let keys: Vec<CacheKey> = stats.entries.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![key(2), key(3)]);
        assert_eq!(stats.entries[0].source, SourceTag::Fallback);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = PositionCache::default();
        cache.set(key(1), snapshot(), SourceTag::Primary);
        cache.set(key(2), snapshot(), SourceTag::Primary);
        assert!(cache.invalidate(&key(1)));
        assert!(!cache.invalidate(&key(1)));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
