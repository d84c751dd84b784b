//! Built-in low-precision ephemeris.
//!
//! Planets come from the JPL mean Keplerian elements (Standish, valid
//! 1800–2050, usable a little beyond). The Moon uses the principal periodic
//! terms of the ELP-2000/82 based series; the Earth is recovered from the
//! Earth–Moon barycentre. Everything is returned heliocentric, in AU, on the
//! mean ecliptic and equinox of J2000 so it flows through the same
//! transform as any upstream source.

use crate::ephemeris::frames::{
    add, general_precession_longitude_deg, scale, spherical_to_cartesian, sub, Vector3,
};
use crate::ephemeris::source::{EphemerisSource, HeliocentricFrame};
use crate::ephemeris::types::Body;
use crate::error::SourceError;
use crate::time::{julian_centuries, normalize_degrees};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// Astronomical unit in kilometres.
pub const AU_KM: f64 = 149_597_870.7;

/// Earth/Moon mass ratio.
const EMRAT: f64 = 81.300_56;

/// Mean elements at J2000 and their rates per Julian century.
#[derive(Debug, Clone, Copy)]
struct KeplerElements {
    /// Semi-major axis, AU
    a: (f64, f64),
    /// Eccentricity
    e: (f64, f64),
    /// Inclination, degrees
    i: (f64, f64),
    /// Mean longitude, degrees
    l: (f64, f64),
    /// Longitude of perihelion, degrees
    peri: (f64, f64),
    /// Longitude of the ascending node, degrees
    node: (f64, f64),
}

#[rustfmt::skip]
const EARTH_MOON_BARYCENTRE: KeplerElements = KeplerElements {
    a: (1.000_002_61, 0.000_005_62), e: (0.016_711_23, -0.000_043_92), i: (-0.000_015_31, -0.012_946_68),
    l: (100.464_571_66, 35_999.372_449_81), peri: (102.937_681_93, 0.323_273_64), node: (0.0, 0.0),
};

#[rustfmt::skip]
fn planet_elements(body: Body) -> Option<KeplerElements> {
    let el = match body {
        Body::Mercury => KeplerElements {
            a: (0.387_099_27, 0.000_000_37), e: (0.205_635_93, 0.000_019_06), i: (7.004_979_02, -0.005_947_49),
            l: (252.250_323_50, 149_472.674_111_75), peri: (77.457_796_28, 0.160_476_89), node: (48.330_765_93, -0.125_340_81),
        },
        Body::Venus => KeplerElements {
            a: (0.723_335_66, 0.000_003_90), e: (0.006_776_72, -0.000_041_07), i: (3.394_676_05, -0.000_788_90),
            l: (181.979_099_50, 58_517.815_387_29), peri: (131.602_467_18, 0.002_683_29), node: (76.679_842_55, -0.277_694_18),
        },
        Body::Mars => KeplerElements {
            a: (1.523_710_34, 0.000_018_47), e: (0.093_394_10, 0.000_078_82), i: (1.849_691_42, -0.008_131_31),
            l: (-4.553_432_05, 19_140.302_684_99), peri: (-23.943_629_59, 0.444_410_88), node: (49.559_538_91, -0.292_573_43),
        },
        Body::Jupiter => KeplerElements {
            a: (5.202_887_00, -0.000_116_07), e: (0.048_386_24, -0.000_132_53), i: (1.304_396_95, -0.001_837_14),
            l: (34.396_440_51, 3_034.746_127_75), peri: (14.728_479_83, 0.212_526_68), node: (100.473_909_09, 0.204_691_06),
        },
        Body::Saturn => KeplerElements {
            a: (9.536_675_94, -0.001_250_60), e: (0.053_861_79, -0.000_509_91), i: (2.485_991_87, 0.001_936_09),
            l: (49.954_244_23, 1_222.493_622_01), peri: (92.598_878_31, -0.418_972_16), node: (113.662_424_48, -0.288_677_94),
        },
        Body::Uranus => KeplerElements {
            a: (19.189_164_64, -0.001_961_76), e: (0.047_257_44, -0.000_043_97), i: (0.772_637_83, -0.002_429_39),
            l: (313.238_104_51, 428.482_027_85), peri: (170.954_276_30, 0.408_052_81), node: (74.016_925_03, 0.042_405_89),
        },
        Body::Neptune => KeplerElements {
            a: (30.069_922_76, 0.000_262_91), e: (0.008_590_48, 0.000_051_05), i: (1.770_043_47, 0.000_353_72),
            l: (-55.120_029_69, 218.459_453_25), peri: (44.964_762_27, -0.322_414_64), node: (131.784_225_74, -0.005_086_64),
        },
        Body::Pluto => KeplerElements {
            a: (39.482_116_75, -0.000_315_96), e: (0.248_827_30, 0.000_051_70), i: (17.140_012_06, 0.000_048_18),
            l: (238.929_038_33, 145.207_805_15), peri: (224.068_916_29, -0.040_629_42), node: (110.303_936_84, -0.011_834_82),
        },
        _ => return None,
    };
    Some(el)
}

/// Solve Kepler's equation `M = E - e sin E` (radians).
fn solve_kepler(mean_anomaly: f64, e: f64) -> f64 {
    let mut ecc_anomaly = mean_anomaly + e * mean_anomaly.sin();
    for _ in 0..30 {
        let delta = (ecc_anomaly - e * ecc_anomaly.sin() - mean_anomaly)
            / (1.0 - e * ecc_anomaly.cos());
        ecc_anomaly -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }
    ecc_anomaly
}

/// Heliocentric ecliptic J2000 position (AU) from mean elements.
fn kepler_position(el: &KeplerElements, t: f64) -> Vector3 {
    let a = el.a.0 + el.a.1 * t;
    let e = el.e.0 + el.e.1 * t;
    let i = (el.i.0 + el.i.1 * t).to_radians();
    let l = el.l.0 + el.l.1 * t;
    let peri = el.peri.0 + el.peri.1 * t;
    let node = el.node.0 + el.node.1 * t;

    let omega = (peri - node).to_radians();
    let mut m = normalize_degrees(l - peri);
    if m > 180.0 {
        m -= 360.0;
    }
    let ecc = solve_kepler(m.to_radians(), e);

    let xp = a * (ecc.cos() - e);
    let yp = a * (1.0 - e * e).sqrt() * ecc.sin();

    let node = node.to_radians();
    let (so, co) = omega.sin_cos();
    let (sn, cn) = node.sin_cos();
    let (si, ci) = i.sin_cos();

    [
        (co * cn - so * sn * ci) * xp + (-so * cn - co * sn * ci) * yp,
        (co * sn + so * cn * ci) * xp + (-so * sn + co * cn * ci) * yp,
        (so * si) * xp + (co * si) * yp,
    ]
}

/// Periodic terms for lunar longitude and distance.
/// Row: `[D, M, M', F, Σl (1e-6°), Σr (1e-3 km)]`.
#[rustfmt::skip]
static MOON_LR_TERMS: [[f64; 6]; 32] = [
    [0.0,  0.0,  1.0,  0.0,  6_288_774.0, -20_905_355.0],
    [2.0,  0.0, -1.0,  0.0,  1_274_027.0,  -3_699_111.0],
    [2.0,  0.0,  0.0,  0.0,    658_314.0,  -2_955_968.0],
    [0.0,  0.0,  2.0,  0.0,    213_618.0,    -569_925.0],
    [0.0,  1.0,  0.0,  0.0,   -185_116.0,      48_888.0],
    [0.0,  0.0,  0.0,  2.0,   -114_332.0,      -3_149.0],
    [2.0,  0.0, -2.0,  0.0,     58_793.0,     246_158.0],
    [2.0, -1.0, -1.0,  0.0,     57_066.0,    -152_138.0],
    [2.0,  0.0,  1.0,  0.0,     53_322.0,    -170_733.0],
    [2.0, -1.0,  0.0,  0.0,     45_758.0,    -204_586.0],
    [0.0,  1.0, -1.0,  0.0,    -40_923.0,    -129_620.0],
    [1.0,  0.0,  0.0,  0.0,    -34_720.0,     108_743.0],
    [0.0,  1.0,  1.0,  0.0,    -30_383.0,     104_755.0],
    [2.0,  0.0,  0.0, -2.0,     15_327.0,      10_321.0],
    [0.0,  0.0,  1.0,  2.0,    -12_528.0,           0.0],
    [0.0,  0.0,  1.0, -2.0,     10_980.0,      79_661.0],
    [4.0,  0.0, -1.0,  0.0,     10_675.0,     -34_782.0],
    [0.0,  0.0,  3.0,  0.0,     10_034.0,     -23_210.0],
    [4.0,  0.0, -2.0,  0.0,      8_548.0,     -21_636.0],
    [2.0,  1.0, -1.0,  0.0,     -7_888.0,      24_208.0],
    [2.0,  1.0,  0.0,  0.0,     -6_766.0,      30_824.0],
    [1.0,  0.0, -1.0,  0.0,     -5_163.0,      -8_379.0],
    [1.0,  1.0,  0.0,  0.0,      4_987.0,     -16_675.0],
    [2.0, -1.0,  1.0,  0.0,      4_036.0,     -12_831.0],
    [2.0,  0.0,  2.0,  0.0,      3_994.0,     -10_445.0],
    [4.0,  0.0,  0.0,  0.0,      3_861.0,     -11_650.0],
    [2.0,  0.0, -3.0,  0.0,      3_665.0,      14_403.0],
    [0.0,  1.0, -2.0,  0.0,     -2_689.0,      -7_003.0],
    [2.0,  0.0, -1.0,  2.0,     -2_602.0,           0.0],
    [2.0, -1.0, -2.0,  0.0,      2_390.0,      10_056.0],
    [1.0,  0.0,  1.0,  0.0,     -2_348.0,       6_322.0],
    [2.0, -2.0,  0.0,  0.0,      2_236.0,      -9_884.0],
];

/// Periodic terms for lunar latitude. Row: `[D, M, M', F, Σb (1e-6°)]`.
#[rustfmt::skip]
static MOON_B_TERMS: [[f64; 5]; 28] = [
    [0.0,  0.0,  0.0,  1.0, 5_128_122.0],
    [0.0,  0.0,  1.0,  1.0,   280_602.0],
    [0.0,  0.0,  1.0, -1.0,   277_693.0],
    [2.0,  0.0,  0.0, -1.0,   173_237.0],
    [2.0,  0.0, -1.0,  1.0,    55_413.0],
    [2.0,  0.0, -1.0, -1.0,    46_271.0],
    [2.0,  0.0,  0.0,  1.0,    32_573.0],
    [0.0,  0.0,  2.0,  1.0,    17_198.0],
    [2.0,  0.0,  1.0, -1.0,     9_266.0],
    [0.0,  0.0,  2.0, -1.0,     8_822.0],
    [2.0, -1.0,  0.0, -1.0,     8_216.0],
    [2.0,  0.0, -2.0, -1.0,     4_324.0],
    [2.0,  0.0,  1.0,  1.0,     4_200.0],
    [2.0,  1.0,  0.0, -1.0,    -3_359.0],
    [2.0, -1.0, -1.0,  1.0,     2_463.0],
    [2.0, -1.0,  0.0,  1.0,     2_211.0],
    [2.0, -1.0, -1.0, -1.0,     2_065.0],
    [0.0,  1.0, -1.0, -1.0,    -1_870.0],
    [4.0,  0.0, -1.0, -1.0,     1_828.0],
    [0.0,  1.0,  0.0,  1.0,    -1_794.0],
    [0.0,  0.0,  0.0,  3.0,    -1_749.0],
    [0.0,  1.0, -1.0,  1.0,    -1_565.0],
    [1.0,  0.0,  0.0,  1.0,    -1_491.0],
    [0.0,  1.0,  1.0,  1.0,    -1_475.0],
    [0.0,  1.0,  1.0, -1.0,    -1_410.0],
    [0.0,  1.0,  0.0, -1.0,    -1_344.0],
    [1.0,  0.0,  0.0, -1.0,    -1_335.0],
    [0.0,  0.0,  3.0,  1.0,     1_107.0],
];

/// Geometric geocentric Moon: ecliptic longitude and latitude of the mean
/// equinox of date (degrees) and distance (km).
pub fn moon_geocentric(t: f64) -> (f64, f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;

    let lp = normalize_degrees(
        218.316_447_7 + 481_267.881_234_21 * t - 0.001_578_6 * t2 + t3 / 538_841.0
            - t4 / 65_194_000.0,
    );
    let d = normalize_degrees(
        297.850_192_1 + 445_267.111_403_4 * t - 0.001_881_9 * t2 + t3 / 545_868.0
            - t4 / 113_065_000.0,
    );
    let m = normalize_degrees(357.529_109_2 + 35_999.050_290_9 * t - 0.000_153_6 * t2 + t3 / 24_490_000.0);
    let mp = normalize_degrees(
        134.963_396_4 + 477_198.867_505_5 * t + 0.008_741_4 * t2 + t3 / 69_699.0
            - t4 / 14_712_000.0,
    );
    let f = normalize_degrees(
        93.272_095_0 + 483_202.017_523_3 * t - 0.003_653_9 * t2 - t3 / 3_526_000.0
            + t4 / 863_310_000.0,
    );

    let a1 = (119.75 + 131.849 * t).to_radians();
    let a2 = (53.09 + 479_264.290 * t).to_radians();
    let a3 = (313.45 + 481_266.484 * t).to_radians();
    let ecc = 1.0 - 0.002_516 * t - 0.000_007_4 * t2;

    let eccentricity_factor = |m_mult: f64| match m_mult.abs() as i32 {
        1 => ecc,
        2 => ecc * ecc,
        _ => 1.0,
    };

    let mut sum_l = 0.0;
    let mut sum_r = 0.0;
    for row in &MOON_LR_TERMS {
        let arg = (row[0] * d + row[1] * m + row[2] * mp + row[3] * f).to_radians();
        let k = eccentricity_factor(row[1]);
        sum_l += row[4] * k * arg.sin();
        sum_r += row[5] * k * arg.cos();
    }

    let mut sum_b = 0.0;
    for row in &MOON_B_TERMS {
        let arg = (row[0] * d + row[1] * m + row[2] * mp + row[3] * f).to_radians();
        sum_b += row[4] * eccentricity_factor(row[1]) * arg.sin();
    }

    let lp_r = lp.to_radians();
    let f_r = f.to_radians();
    let mp_r = mp.to_radians();
    sum_l += 3958.0 * a1.sin() + 1962.0 * (lp_r - f_r).sin() + 318.0 * a2.sin();
    sum_b += -2235.0 * lp_r.sin()
        + 382.0 * a3.sin()
        + 175.0 * (a1 - f_r).sin()
        + 175.0 * (a1 + f_r).sin()
        + 127.0 * (lp_r - mp_r).sin()
        - 115.0 * (lp_r + mp_r).sin();

    (
        normalize_degrees(lp + sum_l / 1_000_000.0),
        sum_b / 1_000_000.0,
        385_000.56 + sum_r / 1000.0,
    )
}

/// Longitude of the Moon's mean ascending node, mean equinox of date.
pub fn mean_lunar_node_deg(t: f64) -> f64 {
    let t2 = t * t;
    normalize_degrees(
        125.044_547_9 - 1934.136_289_1 * t + 0.002_075_4 * t2 + t2 * t / 467_441.0
            - t2 * t2 / 60_616_000.0,
    )
}

/// Geocentric Moon vector in AU on the J2000 ecliptic.
fn moon_geocentric_j2000(t: f64) -> Vector3 {
    let (lon_date, lat, dist_km) = moon_geocentric(t);
    let lon_j2000 = normalize_degrees(lon_date - general_precession_longitude_deg(t));
    spherical_to_cartesian(lon_j2000, lat, dist_km / AU_KM)
}

/// Ephemeris source backed by mean orbital elements.
///
/// Used as the default source and as the fallback when an upstream source
/// is unreachable.
#[derive(Debug, Clone, Default)]
pub struct MeanElementsSource {
    only: Option<BTreeSet<Body>>,
}

impl MeanElementsSource {
    pub fn new() -> Self {
        Self { only: None }
    }

    /// Restrict the bodies this source will answer for; others are omitted
    /// from every frame.
    pub fn restricted_to(bodies: &[Body]) -> Self {
        Self {
            only: Some(bodies.iter().copied().collect()),
        }
    }

    fn supplies(&self, body: Body) -> bool {
        self.only.as_ref().map_or(true, |set| set.contains(&body))
    }

    /// Synchronous frame computation; the async trait method wraps this.
    pub fn frame(&self, jd_tt: f64, bodies: &[Body]) -> HeliocentricFrame {
        let t = julian_centuries(jd_tt);
        let emb = kepler_position(&EARTH_MOON_BARYCENTRE, t);
        let moon_geo = moon_geocentric_j2000(t);
        let earth = sub(&emb, &scale(&moon_geo, 1.0 / (1.0 + EMRAT)));

        let mut out = BTreeMap::new();
        for &body in bodies {
            if !self.supplies(body) {
                continue;
            }
            let position = match body {
                Body::Moon => Some(add(&earth, &moon_geo)),
                other => planet_elements(other).map(|el| kepler_position(&el, t)),
            };
            if let Some(p) = position {
                out.insert(body, p);
            }
        }

        HeliocentricFrame {
            jd_tt,
            earth,
            bodies: out,
        }
    }
}

#[async_trait]
impl EphemerisSource for MeanElementsSource {
    fn name(&self) -> &str {
        "mean_elements"
    }

    async fn heliocentric(
        &self,
        jd_tt: f64,
        bodies: &[Body],
    ) -> Result<HeliocentricFrame, SourceError> {
        Ok(self.frame(jd_tt, bodies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::frames::norm;

    #[test]
    fn test_solve_kepler_circular() {
        assert!((solve_kepler(1.234, 0.0) - 1.234).abs() < 1e-15);
    }

    #[test]
    fn test_solve_kepler_satisfies_equation() {
        let m = 0.7;
        let e = 0.25;
        let ecc = solve_kepler(m, e);
        assert!((ecc - e * ecc.sin() - m).abs() < 1e-12);
    }

    #[test]
    fn test_earth_distance_near_one_au() {
        let frame = MeanElementsSource::new().frame(2_451_545.0, &[]);
        let r = norm(&frame.earth);
        assert!(r > 0.98 && r < 1.02, "r = {r}");
    }

    #[test]
    fn test_moon_meeus_example() {
        // Meeus example 47.a: 1992 April 12, 0h TD
        // λ = 133.162655°, β = -3.229126°, Δ = 368409.7 km
        let t = (2_448_724.5 - 2_451_545.0) / 36_525.0;
        let (lon, lat, dist) = moon_geocentric(t);
        assert!((lon - 133.162655).abs() < 0.05, "λ = {lon}");
        assert!((lat + 3.229126).abs() < 0.05, "β = {lat}");
        assert!((dist - 368_409.7).abs() < 200.0, "Δ = {dist}");
    }

    #[test]
    fn test_mean_node_meeus_example() {
        // Meeus example 47.a: Ω = 274.400656°
        let t = (2_448_724.5 - 2_451_545.0) / 36_525.0;
        assert!((mean_lunar_node_deg(t) - 274.400656).abs() < 1e-4);
    }

    #[test]
    fn test_restricted_source_omits_bodies() {
        let source = MeanElementsSource::restricted_to(&[Body::Mars]);
        let frame = source.frame(2_451_545.0, &[Body::Mars, Body::Jupiter]);
        assert!(frame.get(Body::Mars).is_some());
        assert!(frame.get(Body::Jupiter).is_none());
    }

    #[test]
    fn test_nodes_are_not_supplied() {
        let frame = MeanElementsSource::new().frame(2_451_545.0, &[Body::NorthNode]);
        assert!(frame.bodies.is_empty());
    }
}
