mod common;

use async_trait::async_trait;
use common::{RefusingSource, SlowSource, UnavailableSource};
use std::collections::BTreeMap;
use std::time::Duration;
use urania::ephemeris::frames::Vector3;
use urania::ephemeris::transform::LIGHT_TIME_DAYS_PER_AU;
use urania::ephemeris::{CoordinateTransform, HeliocentricFrame, TransformOptions};
use urania::time::angle_difference;
use urania::{Body, EphemerisSource, MeanElementsSource, SourceError};

fn transform() -> CoordinateTransform {
    CoordinateTransform::new(Duration::from_secs(5), 1.0)
}

async fn longitude(options: TransformOptions, jd_tt: f64, body: Body) -> f64 {
    let out = transform()
        .with_options(options)
        .positions(&MeanElementsSource::new(), jd_tt, &[body])
        .await
        .unwrap();
    out.positions[0].longitude
}

#[tokio::test]
async fn test_sun_apparent_longitude_1992_oct_13() {
    // Apparent longitude 199.906061, aberration excluded adds ~0.0057
    let expected = 199.906_061;
    let full = longitude(TransformOptions::default(), 2_448_908.5, Body::Sun).await;
    let raw = longitude(TransformOptions::raw(), 2_448_908.5, Body::Sun).await;

    let full_err = angle_difference(full, expected).abs();
    let raw_err = angle_difference(raw, expected).abs();
    assert!(full_err < 0.03, "full = {full}");
    assert!(full_err < raw_err, "full {full_err} vs raw {raw_err}");
}

#[tokio::test]
async fn test_moon_apparent_longitude_1992_apr_12() {
    let full = longitude(TransformOptions::default(), 2_448_724.5, Body::Moon).await;
    assert!(
        angle_difference(full, 133.167_265).abs() < 0.1,
        "moon = {full}"
    );
}

#[tokio::test]
async fn test_venus_apparent_longitude_1992_dec_20() {
    let expected = 313.081_02;
    let full = longitude(TransformOptions::default(), 2_448_976.5, Body::Venus).await;
    let raw = longitude(TransformOptions::raw(), 2_448_976.5, Body::Venus).await;

    let full_err = angle_difference(full, expected).abs();
    let raw_err = angle_difference(raw, expected).abs();
    assert!(full_err < 0.05, "full = {full}");
    assert!(full_err < raw_err, "full {full_err} vs raw {raw_err}");
}

/// Earth fixed at 1 AU on the x axis, Mars on a fast circular 5 AU orbit.
struct CircularOrbitSource;

const ORBIT_RADIUS: f64 = 5.0;
const ORBIT_RATE_DEG: f64 = 10.0;
const EPOCH: f64 = 2_451_545.0;
const EARTH: Vector3 = [1.0, 0.0, 0.0];

fn orbit_position(jd_tt: f64) -> Vector3 {
    let theta = (ORBIT_RATE_DEG * (jd_tt - EPOCH) + 40.0).to_radians();
    [ORBIT_RADIUS * theta.cos(), ORBIT_RADIUS * theta.sin(), 0.0]
}

fn geocentric_longitude(p: &Vector3) -> f64 {
    (p[1] - EARTH[1]).atan2(p[0] - EARTH[0]).to_degrees().rem_euclid(360.0)
}

#[async_trait]
impl EphemerisSource for CircularOrbitSource {
    fn name(&self) -> &str {
        "circular"
    }

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        let mut out = BTreeMap::new();
        if bodies.contains(&Body::Mars) {
            out.insert(Body::Mars, orbit_position(jd_tt));
        }
        Ok(HeliocentricFrame {
            jd_tt,
            earth: EARTH,
            bodies: out,
        })
    }
}

#[tokio::test]
async fn test_light_time_correction_matches_converged_solution() {
    let jd = EPOCH + 3.0;

    // Iterate the light-time equation to convergence
    let mut tau = 0.0;
    for _ in 0..50 {
        let p = orbit_position(jd - tau);
        let d = ((p[0] - EARTH[0]).powi(2) + (p[1] - EARTH[1]).powi(2)).sqrt();
        tau = d * LIGHT_TIME_DAYS_PER_AU;
    }
    let truth = geocentric_longitude(&orbit_position(jd - tau));

    let light_time_only = TransformOptions {
        light_time: true,
        precession: false,
        nutation: false,
    };
    let source = CircularOrbitSource;
    let corrected = transform()
        .with_options(light_time_only)
        .apparent(&source, jd, &[Body::Mars])
        .await
        .unwrap();
    let uncorrected = transform()
        .with_options(TransformOptions::raw())
        .apparent(&source, jd, &[Body::Mars])
        .await
        .unwrap();

    let corrected = corrected.coords[&Body::Mars].lon_deg;
    let uncorrected = uncorrected.coords[&Body::Mars].lon_deg;
    assert!(angle_difference(corrected, truth).abs() < 0.01);
    assert!(angle_difference(uncorrected, truth).abs() > 0.1);
}

#[tokio::test]
async fn test_retrograde_from_backward_motion() {
    // Jupiter circling clockwise, so its longitude decreases day over day
    struct Clockwise;

    #[async_trait]
    impl EphemerisSource for Clockwise {
        fn name(&self) -> &str {
            "clockwise"
        }

        async fn heliocentric(
            &self,
            jd_tt: f64,
            _bodies: &[Body],
        ) -> Result<HeliocentricFrame, SourceError> {
            let theta = (-2.0 * (jd_tt - EPOCH)).to_radians();
            let mut bodies = BTreeMap::new();
            bodies.insert(Body::Jupiter, [5.0 * theta.cos(), 5.0 * theta.sin(), 0.0]);
            Ok(HeliocentricFrame {
                jd_tt,
                earth: EARTH,
                bodies,
            })
        }
    }

    let out = transform()
        .with_options(TransformOptions::raw())
        .positions(&Clockwise, EPOCH, &[Body::Jupiter])
        .await
        .unwrap();
    let jupiter = out.positions[0];
    assert!(jupiter.speed < 0.0);
    assert!(jupiter.retrograde);
}

#[tokio::test]
async fn test_refused_body_recorded_as_missing() {
    let source = RefusingSource {
        refused: Body::Pluto,
    };
    let out = transform()
        .positions(&source, 2_451_545.0, &Body::ALL)
        .await
        .unwrap();
    assert_eq!(out.positions.len(), Body::ALL.len() - 1);
    assert!(out.positions.iter().all(|p| p.body != Body::Pluto));
    assert_eq!(out.missing.len(), 1);
    assert_eq!(out.missing[0].body, Body::Pluto);
}

#[tokio::test]
async fn test_unavailable_source_is_error() {
    let err = transform()
        .positions(&UnavailableSource, 2_451_545.0, &[Body::Mars])
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Unavailable { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out() {
    let source = SlowSource {
        delay: Duration::from_secs(30),
    };
    let err = CoordinateTransform::new(Duration::from_millis(50), 1.0)
        .positions(&source, 2_451_545.0, &[Body::Mars])
        .await
        .unwrap_err();
    assert_eq!(err, SourceError::Timeout { millis: 50 });
}
