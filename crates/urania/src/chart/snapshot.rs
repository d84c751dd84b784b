use crate::aspects::AspectPoint;
use crate::chart::angles::Angles;
use crate::chart::houses::{resolve_placement, HouseSystem, SignPlacement};
use crate::chart::line::{ChartLine, ChartLineEntry};
use crate::ephemeris::frames::Nutation;
use crate::ephemeris::transform::{MissingBody, TransformOutput};
use crate::ephemeris::types::{Angle, Body, BodyPosition, ChartPoint, Instant};
use crate::ephemeris::upstream::NormalizedPositions;
use crate::error::Result;
use crate::time::{jd_tt, julian_centuries, julian_day, normalize_degrees};
use serde::{Deserialize, Serialize};

/// Where a snapshot's positions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Primary,
    Fallback,
}

/// Positions, angles and cusps for one instant. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSnapshot {
    instant: Instant,
    bodies: Vec<BodyPosition>,
    ascendant: Option<f64>,
    midheaven: Option<f64>,
    house_system: HouseSystem,
    cusps: Option<[f64; 12]>,
    missing: Vec<MissingBody>,
    source: SourceTag,
}

impl ChartSnapshot {
    /// Build from a transform run. Angles and cusps need a location (or
    /// external cusps).
    pub fn new(
        instant: Instant,
        output: TransformOutput,
        house_system: HouseSystem,
        source: SourceTag,
    ) -> Result<Self> {
        let nutation = output
            .nutation
            .unwrap_or_else(|| Nutation::at(julian_centuries(jd_tt(instant.datetime()))));
        let angles = instant
            .location()
            .map(|loc| Angles::compute(julian_day(instant.datetime()), &loc, &nutation));
        Self::assemble(
            instant,
            output.positions,
            angles.map(|a| a.ascendant),
            angles.map(|a| a.midheaven),
            house_system,
            output.missing,
            source,
        )
    }

    /// Build from upstream positions that were already normalized.
    ///
    /// Each angle in the payload wins; a missing one is computed from the
    /// instant's location when it has one. An ascendant alone is enough for
    /// houses.
    pub fn from_normalized(
        instant: Instant,
        positions: NormalizedPositions,
        house_system: HouseSystem,
    ) -> Result<Self> {
        let computed = match (positions.ascendant, positions.midheaven) {
            (Some(_), Some(_)) => None,
            _ => instant.location().map(|loc| {
                let nutation = Nutation::at(julian_centuries(jd_tt(instant.datetime())));
                Angles::compute(julian_day(instant.datetime()), &loc, &nutation)
            }),
        };
        Self::assemble(
            instant,
            positions.bodies,
            positions.ascendant.or(computed.map(|a| a.ascendant)),
            positions.midheaven.or(computed.map(|a| a.midheaven)),
            house_system,
            Vec::new(),
            SourceTag::Primary,
        )
    }

    fn assemble(
        instant: Instant,
        mut bodies: Vec<BodyPosition>,
        ascendant: Option<f64>,
        midheaven: Option<f64>,
        house_system: HouseSystem,
        missing: Vec<MissingBody>,
        source: SourceTag,
    ) -> Result<Self> {
        house_system.validate()?;
        bodies.sort_by_key(|p| p.body);
        let cusps = match (&house_system, ascendant) {
            (HouseSystem::External(c), _) => Some(*c),
            (system, Some(asc)) => Some(system.cusps(asc)),
            (_, None) => None,
        };
        Ok(Self {
            instant,
            bodies,
            ascendant,
            midheaven,
            house_system,
            cusps,
            missing,
            source,
        })
    }

    pub fn instant(&self) -> &Instant {
        &self.instant
    }

    /// Bodies in canonical order
    pub fn bodies(&self) -> &[BodyPosition] {
        &self.bodies
    }

    pub fn body(&self, body: Body) -> Option<&BodyPosition> {
        self.bodies.iter().find(|p| p.body == body)
    }

    pub fn ascendant(&self) -> Option<f64> {
        self.ascendant
    }

    pub fn midheaven(&self) -> Option<f64> {
        self.midheaven
    }

    pub fn descendant(&self) -> Option<f64> {
        self.ascendant.map(|asc| normalize_degrees(asc + 180.0))
    }

    pub fn imum_coeli(&self) -> Option<f64> {
        self.midheaven.map(|mc| normalize_degrees(mc + 180.0))
    }

    pub fn house_system(&self) -> &HouseSystem {
        &self.house_system
    }

    pub fn cusps(&self) -> Option<&[f64; 12]> {
        self.cusps.as_ref()
    }

    pub fn missing(&self) -> &[MissingBody] {
        &self.missing
    }

    pub fn source(&self) -> SourceTag {
        self.source
    }

    /// True when some requested bodies could not be computed.
    pub fn is_degraded(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Sign and house for a longitude in this chart.
    pub fn placement_of(&self, longitude: f64) -> Option<SignPlacement> {
        match (&self.house_system, self.ascendant()) {
            (system @ HouseSystem::External(_), asc) => {
                Some(resolve_placement(longitude, asc.unwrap_or(0.0), system))
            }
            (system, Some(asc)) => Some(resolve_placement(longitude, asc, system)),
            (_, None) => None,
        }
    }

    pub fn placement(&self, body: Body) -> Option<SignPlacement> {
        self.body(body).and_then(|p| self.placement_of(p.longitude))
    }

    /// Angle longitudes present in this chart.
    pub fn angle_longitudes(&self) -> Vec<(Angle, f64)> {
        [
            (Angle::Ascendant, self.ascendant()),
            (Angle::Midheaven, self.midheaven()),
            (Angle::Descendant, self.descendant()),
            (Angle::ImumCoeli, self.imum_coeli()),
        ]
        .into_iter()
        .filter_map(|(angle, lon)| lon.map(|lon| (angle, lon)))
        .collect()
    }

    /// Bodies and angles ready for aspect search. Derived points are
    /// included here and filtered out by the detector.
    pub fn aspect_points(&self) -> Vec<AspectPoint> {
        let mut points: Vec<AspectPoint> = self
            .bodies
            .iter()
            .map(|p| AspectPoint::new(p.body, p.longitude).with_speed(p.speed))
            .collect();
        points.extend(
            self.angle_longitudes()
                .into_iter()
                .map(|(angle, lon)| AspectPoint::new(angle, lon)),
        );
        points
    }

    /// Compact line form of this chart.
    pub fn to_chart_line(&self) -> ChartLine {
        let mut entries: Vec<ChartLineEntry> = self
            .bodies
            .iter()
            .map(|p| ChartLineEntry {
                point: ChartPoint::Body(p.body),
                longitude: p.longitude,
                retrograde: p.retrograde,
            })
            .collect();
        for (angle, lon) in [(Angle::Ascendant, self.ascendant), (Angle::Midheaven, self.midheaven)] {
            if let Some(longitude) = lon {
                entries.push(ChartLineEntry {
                    point: ChartPoint::Angle(angle),
                    longitude,
                    retrograde: false,
                });
            }
        }
        ChartLine::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::types::GeoLocation;
    use crate::ephemeris::upstream::normalize;
    use serde_json::json;

    fn instant(loc: Option<GeoLocation>) -> Instant {
        Instant::parse("2000-01-01", "12:00", loc).unwrap()
    }

    fn position(body: Body, longitude: f64) -> BodyPosition {
        BodyPosition {
            body,
            longitude,
            latitude: 0.0,
            distance: 1.0,
            speed: 1.0,
            retrograde: false,
        }
    }

    #[test]
    fn test_whole_sign_cusps_follow_ascendant() {
        let positions = NormalizedPositions {
            bodies: vec![position(Body::Moon, 95.0), position(Body::Sun, 10.0)],
            ascendant: Some(3.0),
            midheaven: Some(275.0),
            cusps: None,
        };
        let snap =
            ChartSnapshot::from_normalized(instant(None), positions, HouseSystem::WholeSign)
                .unwrap();
        assert_eq!(snap.bodies()[0].body, Body::Sun);
        let cusps = snap.cusps().unwrap();
        for (n, cusp) in cusps.iter().enumerate() {
            assert_eq!(*cusp, 30.0 * n as f64);
        }
        assert_eq!(snap.placement(Body::Moon).unwrap().house, 4);
        assert_eq!(snap.descendant(), Some(183.0));
    }

    #[test]
    fn test_no_location_means_no_houses() {
        let positions = normalize(&json!({ "sun": 10.0 })).unwrap();
        let snap =
            ChartSnapshot::from_normalized(instant(None), positions, HouseSystem::default())
                .unwrap();
        assert!(snap.ascendant().is_none());
        assert!(snap.cusps().is_none());
        assert!(snap.placement(Body::Sun).is_none());
    }

    #[test]
    fn test_payload_ascendant_without_midheaven() {
        let positions = normalize(&json!({ "sun": 95.0, "asc": 3.0 })).unwrap();
        let snap =
            ChartSnapshot::from_normalized(instant(None), positions, HouseSystem::WholeSign)
                .unwrap();
        assert_eq!(snap.ascendant(), Some(3.0));
        assert_eq!(snap.descendant(), Some(183.0));
        assert!(snap.midheaven().is_none());
        assert!(snap.imum_coeli().is_none());
        assert_eq!(snap.placement(Body::Sun).unwrap().house, 4);
        assert_eq!(snap.cusps().unwrap()[0], 0.0);
        assert_eq!(snap.to_chart_line().to_string(), "SUN:95.00|ASC:3.00");
        let angles: Vec<Angle> = snap.angle_longitudes().iter().map(|(a, _)| *a).collect();
        assert_eq!(angles, vec![Angle::Ascendant, Angle::Descendant]);
    }

    #[test]
    fn test_location_computes_angles() {
        let loc = GeoLocation::new(40.7, -74.0).unwrap();
        let positions = normalize(&json!({ "sun": 280.0 })).unwrap();
        let snap =
            ChartSnapshot::from_normalized(instant(Some(loc)), positions, HouseSystem::Equal)
                .unwrap();
        let asc = snap.ascendant().unwrap();
        assert_eq!(snap.cusps().unwrap()[0], asc);
        assert!(snap.placement(Body::Sun).is_some());
    }

    #[test]
    fn test_aspect_points_include_angles() {
        let positions = NormalizedPositions {
            bodies: vec![position(Body::Sun, 10.0)],
            ascendant: Some(100.0),
            midheaven: Some(10.0),
            cusps: None,
        };
        let snap =
            ChartSnapshot::from_normalized(instant(None), positions, HouseSystem::WholeSign)
                .unwrap();
        let points = snap.aspect_points();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0].speed, Some(1.0));
        assert_eq!(snap.to_chart_line().to_string(), "SUN:10.00|ASC:100.00|MC:10.00");
    }
}
