//! Chart computation entry point.

use crate::aspects::{AspectCalculator, AspectMatch, AspectTable};
use crate::cache::{CacheKey, PositionCache};
use crate::chart::{ChartSnapshot, SourceTag};
use crate::config::EngineConfig;
use crate::ephemeris::elements::MeanElementsSource;
use crate::ephemeris::source::EphemerisSource;
use crate::ephemeris::transform::CoordinateTransform;
use crate::ephemeris::types::{Body, ChartPoint, GeoLocation, Instant};
use crate::error::{AstroError, Result};
use crate::time::jd_tt;
use crate::transit::{TransitEstimator, TransitPeriod};
use chrono::NaiveDate;
use std::sync::Arc;

/// Computes chart snapshots through an injected source and cache.
pub struct ChartEngine {
    source: Arc<dyn EphemerisSource>,
    fallback: Option<Arc<dyn EphemerisSource>>,
    cache: Arc<PositionCache>,
    config: EngineConfig,
    table: AspectTable,
}

impl ChartEngine {
    pub fn new(
        source: Arc<dyn EphemerisSource>,
        cache: Arc<PositionCache>,
        config: EngineConfig,
    ) -> Result<Self> {
        let table = config.aspect_table()?;
        let fallback: Option<Arc<dyn EphemerisSource>> =
            if config.ephemeris.fallback_to_mean_elements {
                Some(Arc::new(MeanElementsSource::new()))
            } else {
                None
            };
        Ok(Self {
            source,
            fallback,
            cache,
            config,
            table,
        })
    }

    /// Engine backed only by the built-in mean-elements source.
    pub fn with_builtin_source(cache: Arc<PositionCache>, config: EngineConfig) -> Result<Self> {
        Self::new(Arc::new(MeanElementsSource::new()), cache, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<PositionCache> {
        &self.cache
    }

    pub fn aspect_table(&self) -> &AspectTable {
        &self.table
    }

    fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(
            self.config.upstream_timeout(),
            self.config.ephemeris.retrograde_delta_days,
        )
    }

    /// Positions for an instant.
    ///
    /// Instants exactly on the hour are cached under (date, hour, location);
    /// anything finer bypasses the cache. Only primary-source charts are
    /// served from the cache.
    pub async fn compute_positions(&self, instant: &Instant) -> Result<Arc<ChartSnapshot>> {
        match CacheKey::for_instant(instant) {
            Some(key) => self.cached(key, instant).await,
            None => Ok(Arc::new(self.compute_uncached(instant).await?)),
        }
    }

    /// Positions at 12:00 UTC on `date`, cached under (date, no hour, location).
    pub async fn compute_daily_positions(
        &self,
        date: NaiveDate,
        location: Option<GeoLocation>,
    ) -> Result<Arc<ChartSnapshot>> {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .ok_or_else(|| AstroError::invalid_instant(format!("no noon on {}", date)))?;
        let instant = Instant::new(noon.and_utc(), location)?;
        self.cached(CacheKey::daily(date, location.as_ref()), &instant)
            .await
    }

    /// Fallback entries never count as hits: the primary is retried and a
    /// successful answer replaces them. Until then they stay reachable
    /// through [`stale_positions`](Self::stale_positions).
    async fn cached(&self, key: CacheKey, instant: &Instant) -> Result<Arc<ChartSnapshot>> {
        match self.cache.get(&key) {
            Some(entry) if entry.source == SourceTag::Primary => return Ok(entry.snapshot),
            Some(_) => log::debug!("Cached chart for {:?} is a fallback; retrying primary", key),
            None => {}
        }
        let snapshot = Arc::new(self.compute_uncached(instant).await?);
        self.cache
            .set(key, Arc::clone(&snapshot), snapshot.source());
        Ok(snapshot)
    }

    /// Last cached snapshot for an hour-aligned instant, even if expired.
    /// Lets callers serve stale data when the upstream is unavailable.
    pub fn stale_positions(&self, instant: &Instant) -> Option<Arc<ChartSnapshot>> {
        CacheKey::for_instant(instant)
            .and_then(|key| self.cache.get_stale(&key))
            .map(|entry| entry.snapshot)
    }

    /// Compute without touching the cache, falling back to the built-in
    /// source when the primary is unreachable and fallback is enabled.
    pub async fn compute_uncached(&self, instant: &Instant) -> Result<ChartSnapshot> {
        let jd = jd_tt(instant.datetime());
        let transform = self.transform();
        let system = self.config.houses.system;

        match transform.positions(self.source.as_ref(), jd, &Body::ALL).await {
            Ok(output) => ChartSnapshot::new(*instant, output, system, SourceTag::Primary),
            Err(err) => {
                let err = err.into_astro(self.source.name());
                log::warn!("Primary ephemeris failed: {}", err);
                let Some(fallback) = &self.fallback else {
                    return Err(err);
                };
                log::warn!(
                    "Falling back to '{}' for {}",
                    fallback.name(),
                    instant.datetime()
                );
                let output = transform
                    .positions(fallback.as_ref(), jd, &Body::ALL)
                    .await
                    .map_err(|e| e.into_astro(fallback.name()))?;
                ChartSnapshot::new(*instant, output, system, SourceTag::Fallback)
            }
        }
    }

    fn calculator(&self, table: &AspectTable) -> AspectCalculator {
        AspectCalculator::new(table.clone()).with_exact_orb(self.config.transit.exact_orb)
    }

    /// Aspects within one chart.
    pub fn natal_aspects(&self, snapshot: &ChartSnapshot, table: &AspectTable) -> Vec<AspectMatch> {
        self.calculator(table).natal(&snapshot.aspect_points())
    }

    /// Transiting chart (`a`) against a natal chart (`b`).
    pub fn transit_aspects(
        &self,
        transiting: &ChartSnapshot,
        natal: &ChartSnapshot,
        table: &AspectTable,
    ) -> Vec<AspectMatch> {
        let moving: Vec<_> = transiting
            .aspect_points()
            .into_iter()
            .filter(|p| matches!(p.point, ChartPoint::Body(_)))
            .collect();
        self.calculator(table)
            .cross(&moving, &natal.aspect_points())
    }

    /// Person A's chart (`a`) against person B's chart (`b`).
    pub fn synastry_aspects(
        &self,
        a: &ChartSnapshot,
        b: &ChartSnapshot,
        table: &AspectTable,
    ) -> Vec<AspectMatch> {
        self.calculator(table)
            .cross(&a.aspect_points(), &b.aspect_points())
    }

    /// Transit matches with their estimated activity windows.
    pub fn transit_periods(
        &self,
        transiting: &ChartSnapshot,
        natal: &ChartSnapshot,
        table: &AspectTable,
        exact_orb: f64,
    ) -> Result<Vec<(AspectMatch, TransitPeriod)>> {
        let estimator = TransitEstimator::new(table.clone(), exact_orb);
        let reference = transiting.instant().datetime();
        self.transit_aspects(transiting, natal, table)
            .into_iter()
            .map(|m| Ok((m, estimator.estimate_match(&m, reference)?)))
            .collect()
    }
}
