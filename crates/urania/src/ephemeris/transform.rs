//! Heliocentric rectangular coordinates to apparent geocentric ecliptic
//! coordinates of date.
//!
//! Stages run in a fixed order: geocentric conversion, light-time,
//! frame rotation, precession, nutation, spherical conversion. The pure
//! stages are plain functions; [`CoordinateTransform`] drives them against an
//! [`EphemerisSource`] and estimates speed and retrograde motion by running
//! the whole pipeline a second time one delta earlier.

use crate::ephemeris::elements::mean_lunar_node_deg;
use crate::ephemeris::frames::{
    cartesian_to_spherical, general_precession_longitude_deg, mat_mul, mat_vec,
    mean_obliquity_deg, norm, precession_matrix, rot_x, scale, sub, transpose, Matrix3, Nutation,
    SphericalCoords, Vector3, ECLIPTIC_J2000_TO_FK5,
};
use crate::ephemeris::source::{fetch_with_timeout, EphemerisSource, HeliocentricFrame};
use crate::ephemeris::types::{Body, BodyPosition};
use crate::error::SourceError;
use crate::time::{angle_difference, julian_centuries, normalize_degrees};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Light travel time for one astronomical unit, in days.
pub const LIGHT_TIME_DAYS_PER_AU: f64 = 0.005_775_518_3;

/// Which correction stages to apply. Geocentric and spherical conversion
/// always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    pub light_time: bool,
    pub precession: bool,
    pub nutation: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            light_time: true,
            precession: true,
            nutation: true,
        }
    }
}

impl TransformOptions {
    /// Uncorrected geometric positions on the J2000 ecliptic.
    pub fn raw() -> Self {
        Self {
            light_time: false,
            precession: false,
            nutation: false,
        }
    }
}

/// A body the source could not supply for the requested instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingBody {
    pub body: Body,
    pub reason: String,
}

impl MissingBody {
    fn new(body: Body, reason: impl Into<String>) -> Self {
        Self {
            body,
            reason: reason.into(),
        }
    }
}

/// Step 1: body vector relative to the Earth.
pub fn geocentric(helio: &Vector3, earth: &Vector3) -> Vector3 {
    sub(helio, earth)
}

/// One-way light travel time in days for a distance in AU.
pub fn light_time_days(distance_au: f64) -> f64 {
    distance_au * LIGHT_TIME_DAYS_PER_AU
}

/// Steps 3–6 folded into one rotation for a single epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochRotation {
    matrix: Matrix3,
    nutation: Option<Nutation>,
    t: f64,
    options: TransformOptions,
}

impl EpochRotation {
    pub fn new(jd_tt: f64, options: TransformOptions) -> Self {
        let t = julian_centuries(jd_tt);
        let mut m = ECLIPTIC_J2000_TO_FK5;
        let mut obliquity = None;
        if options.precession {
            m = mat_mul(&precession_matrix(t), &m);
            obliquity = Some(mean_obliquity_deg(t));
        }
        let nutation = if options.nutation {
            let n = Nutation::at(t);
            m = mat_mul(&n.matrix(), &m);
            obliquity = Some(n.true_obliquity_deg());
            Some(n)
        } else {
            None
        };
        // back onto the ecliptic of the chosen equator; with the equator left
        // at J2000 the frame tie is undone exactly, bias terms included
        let back = match obliquity {
            Some(eps) => rot_x(eps.to_radians()),
            None => transpose(&ECLIPTIC_J2000_TO_FK5),
        };
        let matrix = mat_mul(&back, &m);
        Self {
            matrix,
            nutation,
            t,
            options,
        }
    }

    /// Rotate a geocentric J2000 ecliptic vector and convert to spherical.
    pub fn apply(&self, geo_j2000: &Vector3) -> SphericalCoords {
        cartesian_to_spherical(&mat_vec(&self.matrix, geo_j2000))
    }

    pub fn nutation(&self) -> Option<Nutation> {
        self.nutation
    }

    /// Longitude of the mean lunar node in the same frame as [`apply`](Self::apply).
    pub fn mean_node_longitude(&self) -> f64 {
        let mut lon = mean_lunar_node_deg(self.t);
        if !self.options.precession {
            lon -= general_precession_longitude_deg(self.t);
        }
        if let Some(n) = self.nutation {
            lon += n.dpsi_deg;
        }
        normalize_degrees(lon)
    }
}

/// Apparent spherical coordinates of every body available at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ApparentSet {
    pub jd_tt: f64,
    pub coords: BTreeMap<Body, SphericalCoords>,
    pub missing: Vec<MissingBody>,
    pub nutation: Option<Nutation>,
}

/// Output of a full transform: positions in canonical body order plus the
/// bodies that had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub positions: Vec<BodyPosition>,
    pub missing: Vec<MissingBody>,
    pub nutation: Option<Nutation>,
}

/// Drives the pipeline against an ephemeris source.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateTransform {
    options: TransformOptions,
    timeout: Duration,
    retrograde_delta_days: f64,
}

impl CoordinateTransform {
    pub fn new(timeout: Duration, retrograde_delta_days: f64) -> Self {
        Self {
            options: TransformOptions::default(),
            timeout,
            retrograde_delta_days,
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> TransformOptions {
        self.options
    }

    /// Fetch a frame, dropping bodies the source refuses outright.
    async fn fetch_frame(
        &self,
        source: &dyn EphemerisSource,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<(HeliocentricFrame, Vec<MissingBody>), SourceError> {
        let mut wanted = bodies.to_vec();
        let mut missing = Vec::new();
        loop {
            match fetch_with_timeout(source, jd_tt, &wanted, self.timeout).await {
                Ok(frame) => return Ok((frame, missing)),
                Err(SourceError::MissingBody { body, jd }) if wanted.contains(&body) => {
                    wanted.retain(|b| *b != body);
                    missing.push(MissingBody::new(
                        body,
                        format!("source '{}' has no coordinates at JD {:.5}", source.name(), jd),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Light-time corrected geocentric J2000 vector for one body.
    async fn retarded_geocentric(
        &self,
        source: &dyn EphemerisSource,
        body: Body,
        helio: &Vector3,
        earth: &Vector3,
        jd_tt: f64,
    ) -> Result<Option<Vector3>, SourceError> {
        let geo = geocentric(helio, earth);
        if !self.options.light_time {
            return Ok(Some(geo));
        }
        let retarded_jd = jd_tt - light_time_days(norm(&geo));
        match fetch_with_timeout(source, retarded_jd, &[body], self.timeout).await {
            Ok(frame) => Ok(frame.get(body).map(|p| geocentric(p, earth))),
            Err(SourceError::MissingBody { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Apparent coordinates at one instant without motion estimates.
    pub async fn apparent(
        &self,
        source: &dyn EphemerisSource,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<ApparentSet, SourceError> {
        let requested: BTreeSet<Body> = bodies.iter().copied().collect();
        let from_source: Vec<Body> = requested
            .iter()
            .copied()
            .filter(|b| *b != Body::Sun && !b.is_lunar_node())
            .collect();

        let (frame, mut missing) = self.fetch_frame(source, jd_tt, &from_source).await?;
        let rotation = EpochRotation::new(jd_tt, self.options);
        let mut coords = BTreeMap::new();

        for &body in &requested {
            match body {
                Body::Sun => {
                    coords.insert(body, rotation.apply(&scale(&frame.earth, -1.0)));
                }
                Body::NorthNode => {
                    coords.insert(body, node_coords(rotation.mean_node_longitude()));
                }
                Body::SouthNode => {
                    coords.insert(body, node_coords(rotation.mean_node_longitude() + 180.0));
                }
                _ => {
                    if missing.iter().any(|m| m.body == body) {
                        continue;
                    }
                    let Some(helio) = frame.get(body) else {
                        missing.push(MissingBody::new(
                            body,
                            format!("source '{}' omitted body at JD {:.5}", source.name(), jd_tt),
                        ));
                        continue;
                    };
                    match self
                        .retarded_geocentric(source, body, helio, &frame.earth, jd_tt)
                        .await?
                    {
                        Some(geo) => {
                            coords.insert(body, rotation.apply(&geo));
                        }
                        None => missing.push(MissingBody::new(
                            body,
                            format!(
                                "source '{}' has no light-time position near JD {:.5}",
                                source.name(),
                                jd_tt
                            ),
                        )),
                    }
                }
            }
        }

        for m in &missing {
            log::warn!("{} missing from ephemeris frame: {}", m.body, m.reason);
        }

        Ok(ApparentSet {
            jd_tt,
            coords,
            missing,
            nutation: rotation.nutation(),
        })
    }

    /// Full transform with speed and retrograde flags.
    pub async fn positions(
        &self,
        source: &dyn EphemerisSource,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<TransformOutput, SourceError> {
        let delta = self.retrograde_delta_days;
        let now = self.apparent(source, jd_tt, bodies).await?;
        let earlier_bodies: Vec<Body> = now.coords.keys().copied().collect();
        let earlier = self.apparent(source, jd_tt - delta, &earlier_bodies).await?;

        let mut positions = Vec::with_capacity(now.coords.len());
        let mut missing = now.missing;
        for (&body, c) in &now.coords {
            match earlier.coords.get(&body) {
                Some(prev) => {
                    let speed = angle_difference(c.lon_deg, prev.lon_deg) / delta;
                    positions.push(BodyPosition {
                        body,
                        longitude: c.lon_deg,
                        latitude: c.lat_deg,
                        distance: c.distance,
                        speed,
                        retrograde: speed < 0.0,
                    });
                }
                None => missing.push(MissingBody::new(
                    body,
                    format!("no coordinates at JD {:.5} for motion estimate", jd_tt - delta),
                )),
            }
        }

        Ok(TransformOutput {
            positions,
            missing,
            nutation: now.nutation,
        })
    }
}

fn node_coords(lon: f64) -> SphericalCoords {
    SphericalCoords {
        lon_deg: normalize_degrees(lon),
        lat_deg: 0.0,
        distance: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::elements::MeanElementsSource;
    use crate::ephemeris::frames::spherical_to_cartesian;

    fn transform() -> CoordinateTransform {
        CoordinateTransform::new(Duration::from_secs(5), 1.0)
    }

    #[test]
    fn test_raw_rotation_is_identity_on_ecliptic() {
        let rotation = EpochRotation::new(2_448_000.5, TransformOptions::raw());
        let v = spherical_to_cartesian(123.4, 1.5, 2.0);
        let s = rotation.apply(&v);
        assert!((s.lon_deg - 123.4).abs() < 1e-9, "lon = {}", s.lon_deg);
        assert!((s.lat_deg - 1.5).abs() < 1e-9, "lat = {}", s.lat_deg);
        assert!((s.distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_precession_advances_longitude() {
        // ~50.3" per year
        let jd = 2_451_545.0 + 36_525.0 * 0.1;
        let options = TransformOptions {
            light_time: false,
            precession: true,
            nutation: false,
        };
        let rotation = EpochRotation::new(jd, options);
        let s = rotation.apply(&spherical_to_cartesian(10.0, 0.0, 1.0));
        let shift = s.lon_deg - 10.0;
        assert!((shift - 0.1397).abs() < 0.002, "shift = {shift}");
    }

    #[test]
    fn test_light_time() {
        assert!((light_time_days(1.0) * 86_400.0 - 499.0).abs() < 1.0);
    }

    #[tokio::test]
    async fn test_positions_cover_requested_bodies() {
        let source = MeanElementsSource::new();
        let out = transform()
            .positions(&source, 2_451_545.0, &Body::ALL)
            .await
            .unwrap();
        assert_eq!(out.positions.len(), Body::ALL.len());
        assert!(out.missing.is_empty());
        for p in &out.positions {
            assert!((0.0..360.0).contains(&p.longitude));
        }
    }

    #[tokio::test]
    async fn test_south_node_opposes_north_node() {
        let source = MeanElementsSource::new();
        let out = transform()
            .positions(&source, 2_455_000.5, &[Body::NorthNode, Body::SouthNode])
            .await
            .unwrap();
        let north = out.positions[0];
        let south = out.positions[1];
        assert!((angle_difference(south.longitude, north.longitude).abs() - 180.0).abs() < 1e-9);
        assert!(north.retrograde);
    }

    #[tokio::test]
    async fn test_restricted_source_reports_missing() {
        let source = MeanElementsSource::restricted_to(&[Body::Mars]);
        let out = transform()
            .positions(&source, 2_451_545.0, &[Body::Sun, Body::Mars, Body::Saturn])
            .await
            .unwrap();
        let bodies: Vec<Body> = out.positions.iter().map(|p| p.body).collect();
        assert_eq!(bodies, vec![Body::Sun, Body::Mars]);
        assert_eq!(out.missing.len(), 1);
        assert_eq!(out.missing[0].body, Body::Saturn);
    }

    #[tokio::test]
    async fn test_sun_moves_about_one_degree_per_day() {
        let source = MeanElementsSource::new();
        let out = transform()
            .positions(&source, 2_451_545.0, &[Body::Sun])
            .await
            .unwrap();
        let sun = out.positions[0];
        assert!(sun.speed > 0.95 && sun.speed < 1.03, "speed = {}", sun.speed);
        assert!(!sun.retrograde);
    }
}
