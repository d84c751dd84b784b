//! Reference frames, precession and nutation.
//!
//! Vectors are plain `[f64; 3]`. Rotations are passive (they rotate the axes,
//! not the vector) and follow the usual R1/R2/R3 convention.

use crate::time::normalize_degrees;

pub type Vector3 = [f64; 3];
pub type Matrix3 = [[f64; 3]; 3];

const ARCSEC_TO_DEG: f64 = 1.0 / 3600.0;

/// VSOP87 mean ecliptic and equinox J2000 -> FK5 (dynamical equator J2000).
#[rustfmt::skip]
pub const ECLIPTIC_J2000_TO_FK5: Matrix3 = [
    [ 1.000_000_000_000,  0.000_000_440_360, -0.000_000_190_919],
    [-0.000_000_479_966,  0.917_482_137_087, -0.397_776_982_902],
    [ 0.000_000_000_000,  0.397_776_982_902,  0.917_482_137_087],
];

pub fn add(a: &Vector3, b: &Vector3) -> Vector3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: &Vector3, b: &Vector3) -> Vector3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: &Vector3, k: f64) -> Vector3 {
    [v[0] * k, v[1] * k, v[2] * k]
}

pub fn norm(v: &Vector3) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

pub fn mat_vec(m: &Matrix3, v: &Vector3) -> Vector3 {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

pub fn mat_mul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Inverse of a rotation matrix.
pub fn transpose(m: &Matrix3) -> Matrix3 {
    std::array::from_fn(|i| std::array::from_fn(|j| m[j][i]))
}

/// Rotation about the x axis.
pub fn rot_x(angle_rad: f64) -> Matrix3 {
    let (s, c) = angle_rad.sin_cos();
    [[1.0, 0.0, 0.0], [0.0, c, s], [0.0, -s, c]]
}

/// Rotation about the y axis.
pub fn rot_y(angle_rad: f64) -> Matrix3 {
    let (s, c) = angle_rad.sin_cos();
    [[c, 0.0, -s], [0.0, 1.0, 0.0], [s, 0.0, c]]
}

/// Rotation about the z axis.
pub fn rot_z(angle_rad: f64) -> Matrix3 {
    let (s, c) = angle_rad.sin_cos();
    [[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 1.0]]
}

/// Equatorial precession angles (ζ, z, θ) in degrees from J2000 to `t`
/// Julian centuries after J2000 (IAU 1976, Lieske).
pub fn precession_angles_deg(t: f64) -> (f64, f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;
    let zeta = 2306.2181 * t + 0.30188 * t2 + 0.017998 * t3;
    let z = 2306.2181 * t + 1.09468 * t2 + 0.018203 * t3;
    let theta = 2004.3109 * t - 0.42665 * t2 - 0.041833 * t3;
    (
        zeta * ARCSEC_TO_DEG,
        z * ARCSEC_TO_DEG,
        theta * ARCSEC_TO_DEG,
    )
}

/// Composite precession matrix, mean equator J2000 -> mean equator of date.
pub fn precession_matrix(t: f64) -> Matrix3 {
    let (zeta, z, theta) = precession_angles_deg(t);
    let m = mat_mul(&rot_y(theta.to_radians()), &rot_z(-zeta.to_radians()));
    mat_mul(&rot_z(-z.to_radians()), &m)
}

/// General precession in ecliptic longitude, degrees (IAU 2006, p_A).
pub fn general_precession_longitude_deg(t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;
    (5028.796195 * t + 1.1054348 * t2 + 0.00007964 * t3 - 0.000023857 * t4 - 0.0000000383 * t5)
        * ARCSEC_TO_DEG
}

/// Mean obliquity of the ecliptic in degrees (Meeus 22.2).
pub fn mean_obliquity_deg(t: f64) -> f64 {
    23.439_291_111 - 0.013_004_166_7 * t - 0.000_000_163_9 * t * t
        + 0.000_000_503_6 * t * t * t
}

/// Fundamental arguments in degrees: `[D, M, M', F, Ω]`.
///
/// - `D`  mean elongation of the Moon from the Sun
/// - `M`  mean anomaly of the Sun
/// - `M'` mean anomaly of the Moon
/// - `F`  Moon's argument of latitude
/// - `Ω`  longitude of the Moon's mean ascending node
pub fn fundamental_arguments_deg(t: f64) -> [f64; 5] {
    let t2 = t * t;
    let t3 = t2 * t;
    let d = 297.85036 + 445_267.111_480 * t - 0.001_914_2 * t2 + t3 / 189_474.0;
    let m = 357.52772 + 35_999.050_340 * t - 0.000_160_3 * t2 - t3 / 300_000.0;
    let mp = 134.96298 + 477_198.867_398 * t + 0.008_697_2 * t2 + t3 / 56_250.0;
    let f = 93.27191 + 483_202.017_538 * t - 0.003_682_5 * t2 + t3 / 327_270.0;
    let om = 125.04452 - 1934.136_261 * t + 0.002_070_8 * t2 + t3 / 450_000.0;
    [
        normalize_degrees(d),
        normalize_degrees(m),
        normalize_degrees(mp),
        normalize_degrees(f),
        normalize_degrees(om),
    ]
}

/// Principal IAU 1980 nutation terms.
///
/// Each row: `[D, M, M', F, Ω, S, S', C, C']`, amplitudes in 0.0001″
/// (S, S' for Δψ; C, C' for Δε; primed values are per Julian century).
#[rustfmt::skip]
static NUTATION_TERMS: [[f64; 9]; 18] = [
    //  D     M    M'    F    Ω          S       S'        C      C'
    [  0.0,  0.0,  0.0,  0.0, 1.0, -171996.0, -174.2,  92025.0,  8.9],
    [ -2.0,  0.0,  0.0,  2.0, 2.0,  -13187.0,   -1.6,   5736.0, -3.1],
    [  0.0,  0.0,  0.0,  2.0, 2.0,   -2274.0,   -0.2,    977.0, -0.5],
    [  0.0,  0.0,  0.0,  0.0, 2.0,    2062.0,    0.2,   -895.0,  0.5],
    [  0.0,  1.0,  0.0,  0.0, 0.0,    1426.0,   -3.4,     54.0, -0.1],
    [  0.0,  0.0,  1.0,  0.0, 0.0,     712.0,    0.1,     -7.0,  0.0],
    [ -2.0,  1.0,  0.0,  2.0, 2.0,    -517.0,    1.2,    224.0, -0.6],
    [  0.0,  0.0,  0.0,  2.0, 1.0,    -386.0,   -0.4,    200.0,  0.0],
    [  0.0,  0.0,  1.0,  2.0, 2.0,    -301.0,    0.0,    129.0, -0.1],
    [ -2.0, -1.0,  0.0,  2.0, 2.0,     217.0,   -0.5,    -95.0,  0.3],
    [ -2.0,  0.0,  1.0,  0.0, 0.0,    -158.0,    0.0,      0.0,  0.0],
    [ -2.0,  0.0,  0.0,  2.0, 1.0,     129.0,    0.1,    -70.0,  0.0],
    [  0.0,  0.0, -1.0,  2.0, 2.0,     123.0,    0.0,    -53.0,  0.0],
    [  2.0,  0.0,  0.0,  0.0, 0.0,      63.0,    0.0,      0.0,  0.0],
    [  0.0,  0.0,  1.0,  0.0, 1.0,      63.0,    0.1,    -33.0,  0.0],
    [  2.0,  0.0, -1.0,  2.0, 2.0,     -59.0,    0.0,     26.0,  0.0],
    [  0.0,  0.0, -1.0,  0.0, 1.0,     -58.0,   -0.1,     32.0,  0.0],
    [  0.0,  0.0,  1.0,  2.0, 1.0,     -51.0,    0.0,     27.0,  0.0],
];

/// Nutation quantities for one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nutation {
    /// Nutation in longitude, degrees
    pub dpsi_deg: f64,
    /// Nutation in obliquity, degrees
    pub deps_deg: f64,
    /// Mean obliquity of date, degrees
    pub mean_obliquity_deg: f64,
}

impl Nutation {
    pub fn at(t: f64) -> Self {
        let args = fundamental_arguments_deg(t);
        let mut dpsi = 0.0;
        let mut deps = 0.0;
        for row in &NUTATION_TERMS {
            let arg = (row[0] * args[0]
                + row[1] * args[1]
                + row[2] * args[2]
                + row[3] * args[3]
                + row[4] * args[4])
                .to_radians();
            dpsi += (row[5] + row[6] * t) * arg.sin();
            deps += (row[7] + row[8] * t) * arg.cos();
        }
        Self {
            dpsi_deg: dpsi * 1e-4 * ARCSEC_TO_DEG,
            deps_deg: deps * 1e-4 * ARCSEC_TO_DEG,
            mean_obliquity_deg: mean_obliquity_deg(t),
        }
    }

    pub fn true_obliquity_deg(&self) -> f64 {
        self.mean_obliquity_deg + self.deps_deg
    }

    /// Mean equator of date -> true equator of date.
    pub fn matrix(&self) -> Matrix3 {
        let eps0 = self.mean_obliquity_deg.to_radians();
        let eps = self.true_obliquity_deg().to_radians();
        let dpsi = self.dpsi_deg.to_radians();
        let m = mat_mul(&rot_z(-dpsi), &rot_x(eps0));
        mat_mul(&rot_x(-eps), &m)
    }
}

/// Spherical coordinates in degrees plus distance in the vector's unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalCoords {
    /// Longitude in [0, 360)
    pub lon_deg: f64,
    /// Latitude in [-90, 90]
    pub lat_deg: f64,
    pub distance: f64,
}

/// Convert a rectangular vector to spherical coordinates.
pub fn cartesian_to_spherical(v: &Vector3) -> SphericalCoords {
    let r = norm(v);
    if r == 0.0 {
        return SphericalCoords {
            lon_deg: 0.0,
            lat_deg: 0.0,
            distance: 0.0,
        };
    }
    SphericalCoords {
        lon_deg: normalize_degrees(v[1].atan2(v[0]).to_degrees()),
        lat_deg: (v[2] / r).clamp(-1.0, 1.0).asin().to_degrees(),
        distance: r,
    }
}

/// Inverse of [`cartesian_to_spherical`].
pub fn spherical_to_cartesian(lon_deg: f64, lat_deg: f64, distance: f64) -> Vector3 {
    let (sl, cl) = lon_deg.to_radians().sin_cos();
    let (sb, cb) = lat_deg.to_radians().sin_cos();
    [distance * cb * cl, distance * cb * sl, distance * sb]
}
