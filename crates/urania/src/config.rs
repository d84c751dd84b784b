//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! [cache]
//! day_ttl_secs = 86400
//! hour_ttl_secs = 3600
//!
//! [ephemeris]
//! upstream_timeout_ms = 2500
//! retrograde_delta_days = 1.0
//! fallback_to_mean_elements = true
//!
//! [aspects]
//! include_minor = false
//! orbs = { conjunction = 10.0, sextile = 3.0 }
//!
//! [transit]
//! exact_orb = 0.1
//!
//! [houses]
//! system = "whole_sign"
//! ```

use crate::aspects::{AspectDefinition, AspectKind, AspectTable, DEFAULT_EXACT_ORB};
use crate::cache::PositionCache;
use crate::chart::HouseSystem;
use crate::error::{AstroError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_day_ttl_secs")]
    pub day_ttl_secs: u64,
    #[serde(default = "default_hour_ttl_secs")]
    pub hour_ttl_secs: u64,
}

fn default_day_ttl_secs() -> u64 {
    86_400
}

fn default_hour_ttl_secs() -> u64 {
    3_600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            day_ttl_secs: default_day_ttl_secs(),
            hour_ttl_secs: default_hour_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EphemerisConfig {
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
    #[serde(default = "default_retrograde_delta_days")]
    pub retrograde_delta_days: f64,
    #[serde(default = "default_true")]
    pub fallback_to_mean_elements: bool,
}

fn default_upstream_timeout_ms() -> u64 {
    2_500
}

fn default_retrograde_delta_days() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        Self {
            upstream_timeout_ms: default_upstream_timeout_ms(),
            retrograde_delta_days: default_retrograde_delta_days(),
            fallback_to_mean_elements: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AspectsConfig {
    #[serde(default)]
    pub include_minor: bool,
    /// Max-orb overrides by aspect name. Naming a minor aspect adds it.
    #[serde(default)]
    pub orbs: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransitConfig {
    #[serde(default = "default_exact_orb")]
    pub exact_orb: f64,
}

fn default_exact_orb() -> f64 {
    DEFAULT_EXACT_ORB
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            exact_orb: default_exact_orb(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HousesConfig {
    #[serde(default)]
    pub system: HouseSystem,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ephemeris: EphemerisConfig,
    #[serde(default)]
    pub aspects: AspectsConfig,
    #[serde(default)]
    pub transit: TransitConfig,
    #[serde(default)]
    pub houses: HousesConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: EngineConfig = toml::from_str(text)
            .map_err(|e| anyhow::anyhow!("Failed to parse engine config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Could not read {}: {e}", path.display()))?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let delta = self.ephemeris.retrograde_delta_days;
        if !delta.is_finite() || delta <= 0.0 {
            anyhow::bail!("ephemeris.retrograde_delta_days must be > 0, got {delta}");
        }
        if self.ephemeris.upstream_timeout_ms == 0 {
            anyhow::bail!("ephemeris.upstream_timeout_ms must be > 0");
        }
        let exact = self.transit.exact_orb;
        if !exact.is_finite() || exact < 0.0 {
            anyhow::bail!("transit.exact_orb must be >= 0, got {exact}");
        }
        self.houses
            .system
            .validate()
            .map_err(|e| anyhow::anyhow!("houses.system: {e}"))?;
        self.aspect_table()
            .map_err(|e| anyhow::anyhow!("aspects: {e}"))?;
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.ephemeris.upstream_timeout_ms)
    }

    pub fn day_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.day_ttl_secs)
    }

    pub fn hour_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.hour_ttl_secs)
    }

    /// Empty cache with the configured TTLs.
    pub fn build_cache(&self) -> PositionCache {
        PositionCache::new(self.day_ttl(), self.hour_ttl())
    }

    /// Default orbs for the selected kinds, with overrides applied.
    pub fn aspect_table(&self) -> Result<AspectTable> {
        let kinds: &[AspectKind] = if self.aspects.include_minor {
            &AspectKind::PRIORITY
        } else {
            &AspectKind::MAJOR
        };
        let mut orbs: BTreeMap<AspectKind, f64> =
            kinds.iter().map(|k| (*k, k.default_orb())).collect();

        for (name, orb) in &self.aspects.orbs {
            let kind = name
                .parse::<AspectKind>()
                .map_err(|_| AstroError::InvalidAspectTable {
                    message: format!("unknown aspect kind '{}'", name),
                })?;
            orbs.insert(kind, *orb);
        }

        AspectTable::new(
            orbs.into_iter()
                .map(|(kind, orb)| AspectDefinition::new(kind, orb))
                .collect(),
        )
    }
}
