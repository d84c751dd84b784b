//! Normalization of upstream ephemeris payloads.
//!
//! Remote providers answer in a handful of JSON layouts. They are all
//! decoded through one untagged enum here and converted into
//! [`NormalizedPositions`], so nothing past this module ever inspects the
//! raw shape.

use crate::chart::houses::HouseSystem;
use crate::ephemeris::types::{Angle, Body, BodyPosition, ChartPoint};
use crate::error::{AstroError, Result};
use crate::time::normalize_degrees;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UpstreamPayload {
    Layered(LayeredPayload),
    List(Vec<ListEntry>),
    Flat(BTreeMap<String, f64>),
}

#[derive(Debug, Deserialize)]
struct LayeredPayload {
    planets: BTreeMap<String, LayeredPlanet>,
    #[serde(default)]
    houses: Option<LayeredHouses>,
}

#[derive(Debug, Deserialize)]
struct LayeredPlanet {
    lon: f64,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    speed_lon: Option<f64>,
    #[serde(default)]
    retrograde: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LayeredHouses {
    #[serde(default)]
    angles: BTreeMap<String, f64>,
    #[serde(default)]
    cusps: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    longitude: f64,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    retrograde: Option<bool>,
}

/// Canonical form of any upstream payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedPositions {
    /// Bodies in canonical order, one entry per body
    pub bodies: Vec<BodyPosition>,
    pub ascendant: Option<f64>,
    pub midheaven: Option<f64>,
    /// Twelve cusps, present only when the payload carried all of them
    pub cusps: Option<[f64; 12]>,
}

impl NormalizedPositions {
    /// House system built from the payload's own cusps, if it had any.
    pub fn external_house_system(&self) -> Option<HouseSystem> {
        self.cusps.map(HouseSystem::External)
    }
}

#[derive(Default)]
struct Collector {
    bodies: BTreeMap<Body, BodyPosition>,
    ascendant: Option<f64>,
    midheaven: Option<f64>,
}

impl Collector {
    fn push(
        &mut self,
        name: &str,
        longitude: f64,
        latitude: f64,
        distance: f64,
        speed: Option<f64>,
        retrograde: Option<bool>,
    ) -> Result<()> {
        if !longitude.is_finite() {
            return Err(AstroError::UpstreamFormat {
                message: format!("non-finite longitude for '{}'", name),
            });
        }
        let point = match name.parse::<ChartPoint>() {
            Ok(point) => point,
            Err(_) => {
                log::debug!("Skipping unknown upstream point '{}'", name);
                return Ok(());
            }
        };
        let longitude = normalize_degrees(longitude);
        match point {
            ChartPoint::Angle(Angle::Ascendant) => self.ascendant = Some(longitude),
            ChartPoint::Angle(Angle::Midheaven) => self.midheaven = Some(longitude),
            ChartPoint::Angle(_) => {}
            ChartPoint::Body(body) => {
                let speed = speed.unwrap_or(0.0);
                self.bodies.insert(
                    body,
                    BodyPosition {
                        body,
                        longitude,
                        latitude,
                        distance,
                        speed,
                        retrograde: retrograde.unwrap_or(speed < 0.0),
                    },
                );
            }
        }
        Ok(())
    }

    fn finish(self, cusps: Option<[f64; 12]>) -> NormalizedPositions {
        NormalizedPositions {
            bodies: self.bodies.into_values().collect(),
            ascendant: self.ascendant,
            midheaven: self.midheaven,
            cusps,
        }
    }
}

fn collect_cusps(raw: &BTreeMap<String, f64>) -> Option<[f64; 12]> {
    let mut cusps = [0.0; 12];
    for (n, slot) in cusps.iter_mut().enumerate() {
        let value = raw.get(&(n + 1).to_string())?;
        if !value.is_finite() {
            return None;
        }
        *slot = normalize_degrees(*value);
    }
    Some(cusps)
}

/// Convert an upstream JSON payload into canonical positions.
pub fn normalize(payload: &Value) -> Result<NormalizedPositions> {
    let decoded: UpstreamPayload =
        serde_json::from_value(payload.clone()).map_err(|e| AstroError::UpstreamFormat {
            message: e.to_string(),
        })?;

    let mut out = Collector::default();
    let normalized = match decoded {
        UpstreamPayload::Layered(layered) => {
            for (name, p) in &layered.planets {
                out.push(name, p.lon, p.lat, p.distance, p.speed_lon, p.retrograde)?;
            }
            let houses = layered.houses.unwrap_or_default();
            for (name, lon) in &houses.angles {
                out.push(name, *lon, 0.0, 0.0, None, None)?;
            }
            out.finish(collect_cusps(&houses.cusps))
        }
        UpstreamPayload::List(entries) => {
            for e in &entries {
                out.push(&e.name, e.longitude, e.latitude, e.distance, e.speed, e.retrograde)?;
            }
            out.finish(None)
        }
        UpstreamPayload::Flat(map) => {
            for (name, lon) in &map {
                out.push(name, *lon, 0.0, 0.0, None, None)?;
            }
            out.finish(None)
        }
    };
    Ok(normalized)
}

/// [`normalize`] for a raw JSON string.
pub fn normalize_str(payload: &str) -> Result<NormalizedPositions> {
    let value: Value = serde_json::from_str(payload).map_err(|e| AstroError::UpstreamFormat {
        message: e.to_string(),
    })?;
    normalize(&value)
}
