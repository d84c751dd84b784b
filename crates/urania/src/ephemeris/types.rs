use crate::error::{AstroError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First and last calendar years covered by the built-in mean elements.
pub const SUPPORTED_YEARS: (i32, i32) = (1800, 2100);

/// Bodies a chart can carry. Order is the canonical chart order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Body {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
    NorthNode,
    SouthNode,
}

impl Body {
    pub const ALL: [Body; 12] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
        Body::Pluto,
        Body::NorthNode,
        Body::SouthNode,
    ];

    /// Bodies whose coordinates come from an ephemeris source.
    /// The Sun is included: its geocentric vector is the negated Earth vector.
    pub const EPHEMERIS: [Body; 10] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
        Body::Pluto,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Body::Sun => "sun",
            Body::Moon => "moon",
            Body::Mercury => "mercury",
            Body::Venus => "venus",
            Body::Mars => "mars",
            Body::Jupiter => "jupiter",
            Body::Saturn => "saturn",
            Body::Uranus => "uranus",
            Body::Neptune => "neptune",
            Body::Pluto => "pluto",
            Body::NorthNode => "north_node",
            Body::SouthNode => "south_node",
        }
    }

    /// Mirror of another point; left out of pairwise aspect search.
    pub fn is_derived(self) -> bool {
        matches!(self, Body::SouthNode)
    }

    pub fn is_lunar_node(self) -> bool {
        matches!(self, Body::NorthNode | Body::SouthNode)
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Body {
    type Err = AstroError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let body = match lower.as_str() {
            "sun" => Body::Sun,
            "moon" => Body::Moon,
            "mercury" => Body::Mercury,
            "venus" => Body::Venus,
            "mars" => Body::Mars,
            "jupiter" => Body::Jupiter,
            "saturn" => Body::Saturn,
            "uranus" => Body::Uranus,
            "neptune" => Body::Neptune,
            "pluto" => Body::Pluto,
            "north_node" | "northnode" | "node" | "true_node" | "mean_node" | "rahu" => {
                Body::NorthNode
            }
            "south_node" | "southnode" | "ketu" => Body::SouthNode,
            _ => return Err(AstroError::invalid_input(format!("Unknown body: {}", s))),
        };
        Ok(body)
    }
}

/// Chart angles derived from local sidereal time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Angle {
    Ascendant,
    Midheaven,
    Descendant,
    ImumCoeli,
}

impl Angle {
    pub fn slug(self) -> &'static str {
        match self {
            Angle::Ascendant => "asc",
            Angle::Midheaven => "mc",
            Angle::Descendant => "dsc",
            Angle::ImumCoeli => "ic",
        }
    }

    /// Descendant and IC are fixed 180° mirrors of ASC and MC.
    pub fn is_derived(self) -> bool {
        matches!(self, Angle::Descendant | Angle::ImumCoeli)
    }
}

/// Anything that can take part in an aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartPoint {
    Body(Body),
    Angle(Angle),
}

impl ChartPoint {
    pub fn slug(self) -> &'static str {
        match self {
            ChartPoint::Body(b) => b.slug(),
            ChartPoint::Angle(a) => a.slug(),
        }
    }

    pub fn is_derived(self) -> bool {
        match self {
            ChartPoint::Body(b) => b.is_derived(),
            ChartPoint::Angle(a) => a.is_derived(),
        }
    }
}

impl fmt::Display for ChartPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ChartPoint {
    type Err = AstroError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let angle = match lower.as_str() {
            "asc" | "ac" | "ascendant" => Some(Angle::Ascendant),
            "mc" | "midheaven" => Some(Angle::Midheaven),
            "dsc" | "desc" | "dc" | "descendant" => Some(Angle::Descendant),
            "ic" | "imum_coeli" => Some(Angle::ImumCoeli),
            _ => None,
        };
        match angle {
            Some(a) => Ok(ChartPoint::Angle(a)),
            None => lower.parse::<Body>().map(ChartPoint::Body),
        }
    }
}

impl From<Body> for ChartPoint {
    fn from(body: Body) -> Self {
        ChartPoint::Body(body)
    }
}

impl From<Angle> for ChartPoint {
    fn from(angle: Angle) -> Self {
        ChartPoint::Angle(angle)
    }
}

/// Geographic location coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Geodetic latitude, degrees north
    pub lat: f64,
    /// Longitude, degrees east
    pub lon: f64,
}

impl GeoLocation {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AstroError::invalid_instant(format!(
                "latitude must be within [-90, 90], got {}",
                lat
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(AstroError::invalid_instant(format!(
                "longitude must be within [-180, 180], got {}",
                lon
            )));
        }
        Ok(Self { lat, lon })
    }
}

/// A validated UTC instant with an optional observer location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Instant {
    datetime: DateTime<Utc>,
    location: Option<GeoLocation>,
}

impl Instant {
    pub fn new(datetime: DateTime<Utc>, location: Option<GeoLocation>) -> Result<Self> {
        let year = datetime.year();
        if year < SUPPORTED_YEARS.0 || year > SUPPORTED_YEARS.1 {
            return Err(AstroError::invalid_instant(format!(
                "year {} outside supported range {}..={}",
                year, SUPPORTED_YEARS.0, SUPPORTED_YEARS.1
            )));
        }
        let location = match location {
            Some(loc) => Some(GeoLocation::new(loc.lat, loc.lon)?),
            None => None,
        };
        Ok(Self { datetime, location })
    }

    /// Parse `YYYY-MM-DD` and `HH:MM[:SS]` (UTC).
    pub fn parse(date: &str, time: &str, location: Option<GeoLocation>) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
            AstroError::invalid_instant(format!("bad date '{}': {}", date, e))
        })?;
        let time_str = time.trim();
        let time = NaiveTime::parse_from_str(time_str, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(time_str, "%H:%M"))
            .map_err(|e| AstroError::invalid_instant(format!("bad time '{}': {}", time_str, e)))?;
        let naive = NaiveDateTime::new(date, time);
        Self::new(naive.and_utc(), location)
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }

    /// Same location, different moment.
    pub fn with_datetime(&self, datetime: DateTime<Utc>) -> Result<Self> {
        Self::new(datetime, self.location)
    }
}

/// Apparent geocentric position of one body at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyPosition {
    pub body: Body,
    /// Ecliptic longitude of date, degrees in [0, 360)
    pub longitude: f64,
    /// Ecliptic latitude, degrees
    pub latitude: f64,
    /// Geocentric distance in AU (0 for analytic points)
    pub distance: f64,
    /// Longitude speed, degrees per day
    pub speed: f64,
    pub retrograde: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_body_parse_aliases() {
        assert_eq!("Sun".parse::<Body>().unwrap(), Body::Sun);
        assert_eq!("rahu".parse::<Body>().unwrap(), Body::NorthNode);
        assert!("vulcan".parse::<Body>().is_err());
    }

    #[test]
    fn test_chart_point_parse() {
        assert_eq!(
            "ASC".parse::<ChartPoint>().unwrap(),
            ChartPoint::Angle(Angle::Ascendant)
        );
        assert_eq!(
            "moon".parse::<ChartPoint>().unwrap(),
            ChartPoint::Body(Body::Moon)
        );
        assert!(ChartPoint::Angle(Angle::ImumCoeli).is_derived());
        assert!(!ChartPoint::Angle(Angle::Midheaven).is_derived());
    }

    #[test]
    fn test_instant_rejects_bad_location() {
        let dt = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let bad = GeoLocation { lat: 91.0, lon: 0.0 };
        assert!(matches!(
            Instant::new(dt, Some(bad)),
            Err(AstroError::InvalidInstant { .. })
        ));
    }

    #[test]
    fn test_instant_rejects_out_of_range_year() {
        let dt = Utc.with_ymd_and_hms(1700, 1, 1, 0, 0, 0).unwrap();
        assert!(Instant::new(dt, None).is_err());
    }

    #[test]
    fn test_instant_parse() {
        let instant = Instant::parse("1992-10-13", "06:30", None).unwrap();
        assert_eq!(
            instant.datetime(),
            Utc.with_ymd_and_hms(1992, 10, 13, 6, 30, 0).unwrap()
        );
        assert!(Instant::parse("1992-13-40", "06:30", None).is_err());
        assert!(Instant::parse("1992-10-13", "6h30", None).is_err());
    }
}
