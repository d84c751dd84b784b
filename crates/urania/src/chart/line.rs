//! Compact chart-data line, e.g. `SUN:120.50|MOON:45.20R|ASC:12.10`.

use crate::aspects::AspectPoint;
use crate::ephemeris::types::ChartPoint;
use crate::error::{AstroError, Result};
use crate::time::normalize_degrees;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static::lazy_static! {
    static ref SEGMENT_SEPARATOR: Regex = Regex::new(r"[|,;\n]").expect("Invalid regex");
    static ref SEGMENT: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z_]*)\s*:\s*([+-]?\d+(?:\.\d+)?)\s*([Rr]?)$").expect("Invalid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartLineEntry {
    pub point: ChartPoint,
    /// In [0, 360)
    pub longitude: f64,
    pub retrograde: bool,
}

/// Parsed chart line, entries in input order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartLine {
    entries: Vec<ChartLineEntry>,
}

impl ChartLine {
    pub fn new(entries: Vec<ChartLineEntry>) -> Self {
        Self { entries }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for raw in SEGMENT_SEPARATOR.split(input) {
            let segment = raw.trim();
            if segment.is_empty() {
                continue;
            }
            let caps = SEGMENT.captures(segment).ok_or_else(|| AstroError::ChartLine {
                segment: segment.to_string(),
                message: "expected NAME:DEGREES with optional R suffix".to_string(),
            })?;
            let point = caps[1]
                .parse::<ChartPoint>()
                .map_err(|e| AstroError::ChartLine {
                    segment: segment.to_string(),
                    message: e.to_string(),
                })?;
            let longitude: f64 = caps[2].parse().map_err(|e| AstroError::ChartLine {
                segment: segment.to_string(),
                message: format!("bad longitude: {}", e),
            })?;
            entries.push(ChartLineEntry {
                point,
                longitude: normalize_degrees(longitude),
                retrograde: !caps[3].is_empty(),
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ChartLineEntry] {
        &self.entries
    }

    pub fn get(&self, point: ChartPoint) -> Option<&ChartLineEntry> {
        self.entries.iter().find(|e| e.point == point)
    }

    /// Entries as aspect points. The line carries no speeds, so matches
    /// built from it leave `applying` unset.
    pub fn aspect_points(&self) -> Vec<AspectPoint> {
        self.entries
            .iter()
            .map(|e| AspectPoint {
                point: e.point,
                longitude: e.longitude,
                speed: None,
            })
            .collect()
    }
}

impl FromStr for ChartLine {
    type Err = AstroError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Canonical rendering: upper-case names, two decimals, `|` separated.
///
/// Longitudes are rounded before wrapping, so 359.996 renders as `0.00`.
pub fn format_chart_line(line: &ChartLine) -> String {
    line.entries
        .iter()
        .map(|e| {
            let longitude = normalize_degrees((e.longitude * 100.0).round() / 100.0);
            format!(
                "{}:{:.2}{}",
                e.point.slug().to_uppercase(),
                longitude,
                if e.retrograde { "R" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("|")
}

impl fmt::Display for ChartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_chart_line(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::types::{Angle, Body};

    #[test]
    fn test_parse_canonical_line() {
        let line = ChartLine::parse("SUN:120.50|MOON:45.20R|ASC:12.10").unwrap();
        assert_eq!(line.entries().len(), 3);
        let moon = line.get(ChartPoint::Body(Body::Moon)).unwrap();
        assert_eq!(moon.longitude, 45.2);
        assert!(moon.retrograde);
        assert!(line.get(ChartPoint::Angle(Angle::Ascendant)).is_some());
    }

    #[test]
    fn test_parse_mixed_separators() {
        let line: ChartLine = "sun: 10 ; mars:370.5,\nvenus:-20".parse().unwrap();
        let lons: Vec<f64> = line.entries().iter().map(|e| e.longitude).collect();
        assert_eq!(lons, vec![10.0, 10.5, 340.0]);
    }

    #[test]
    fn test_parse_errors_carry_segment() {
        match ChartLine::parse("SUN:120.5|VULCAN:3.0") {
            Err(AstroError::ChartLine { segment, .. }) => assert_eq!(segment, "VULCAN:3.0"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ChartLine::parse("SUN:abc").is_err());
        assert!(ChartLine::parse("SUN120").is_err());
    }

    #[test]
    fn test_format_round_trip() {
        let text = "SUN:120.50|MOON:45.20R|NORTH_NODE:300.00|MC:12.10";
        let line = ChartLine::parse(text).unwrap();
        assert_eq!(format_chart_line(&line), text);
        assert_eq!(line.to_string(), text);
    }

    #[test]
    fn test_format_wraps_after_rounding() {
        let line = ChartLine::parse("SUN:359.996|MOON:-0.001R|MARS:359.994").unwrap();
        assert_eq!(format_chart_line(&line), "SUN:0.00|MOON:0.00R|MARS:359.99");

        let reparsed = ChartLine::parse(&line.to_string()).unwrap();
        assert!(reparsed.entries().iter().all(|e| e.longitude < 360.0));
    }

    #[test]
    fn test_empty_line() {
        assert!(ChartLine::parse("  ").unwrap().entries().is_empty());
    }
}
