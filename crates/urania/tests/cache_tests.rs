use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use urania::cache::Freshness;
use urania::ephemeris::NormalizedPositions;
use urania::{CacheKey, ChartSnapshot, GeoLocation, HouseSystem, Instant, PositionCache, SourceTag};

fn snapshot() -> Arc<ChartSnapshot> {
    let instant = Instant::parse("2022-01-15", "09:00", None).unwrap();
    Arc::new(
        ChartSnapshot::from_normalized(instant, NormalizedPositions::default(), HouseSystem::WholeSign)
            .unwrap(),
    )
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 15).unwrap()
}

#[test]
fn test_round_trip_returns_same_snapshot() {
    let cache = PositionCache::default();
    let key = CacheKey::new(date(), Some(9), None);
    let stored = snapshot();
    cache.set(key, Arc::clone(&stored), SourceTag::Primary);

    let entry = cache.get(&key).unwrap();
    assert!(Arc::ptr_eq(&entry.snapshot, &stored));
    assert_eq!(entry.source, SourceTag::Primary);
}

#[test]
fn test_keys_distinguish_hour_and_location() {
    let cache = PositionCache::default();
    let paris = GeoLocation::new(48.8566, 2.3522).unwrap();
    cache.set(CacheKey::new(date(), Some(9), None), snapshot(), SourceTag::Primary);

    assert!(cache.get(&CacheKey::new(date(), Some(10), None)).is_none());
    assert!(cache.get(&CacheKey::new(date(), Some(9), Some(&paris))).is_none());
    assert!(cache.get(&CacheKey::daily(date(), None)).is_none());
}

#[test]
fn test_expired_entry_is_a_miss() {
    let cache = PositionCache::new(Duration::from_secs(120), Duration::from_secs(60));
    let key = CacheKey::daily(date(), None);
    let created = Utc.with_ymd_and_hms(2022, 1, 15, 9, 0, 0).unwrap();
    cache.set_at(key, snapshot(), SourceTag::Fallback, created);

    assert!(cache.get_at(&key, created + ChronoDuration::seconds(30)).is_some());
    assert!(cache.get_at(&key, created + ChronoDuration::seconds(90)).is_some());
    assert!(cache.get_at(&key, created + ChronoDuration::seconds(120)).is_none());

    let stats = cache.stats_at(created + ChronoDuration::seconds(90));
    assert_eq!(stats.size, 1);
    assert_eq!(stats.entries[0].freshness, Freshness::Day);
    assert_eq!(stats.entries[0].source, SourceTag::Fallback);
}

#[test]
fn test_concurrent_writers_leave_one_entry() {
    let cache = Arc::new(PositionCache::default());
    let key = CacheKey::daily(date(), None);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.set(key, snapshot(), SourceTag::Primary))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.len(), 1);
    assert!(cache.get(&key).is_some());
}
