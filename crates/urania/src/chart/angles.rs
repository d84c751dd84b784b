use crate::ephemeris::frames::Nutation;
use crate::ephemeris::types::GeoLocation;
use crate::time::{local_sidereal_time_deg, normalize_degrees};
use serde::{Deserialize, Serialize};

/// Ascendant and Midheaven; Descendant and IC are their mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Angles {
    pub ascendant: f64,
    pub midheaven: f64,
}

impl Angles {
    /// Angles for a UT Julian Day and observer.
    ///
    /// Uses apparent sidereal time (mean plus equation of the equinoxes) and
    /// the true obliquity, so the result sits in the same frame as the
    /// apparent body longitudes.
    pub fn compute(jd_ut: f64, location: &GeoLocation, nutation: &Nutation) -> Self {
        let eps = nutation.true_obliquity_deg().to_radians();
        let equation_of_equinoxes = nutation.dpsi_deg * eps.cos();
        let ramc = (local_sidereal_time_deg(jd_ut, location.lon) + equation_of_equinoxes)
            .to_radians();
        Self::from_ramc(ramc, eps, location.lat.to_radians())
    }

    /// Angles from the right ascension of the MC, obliquity and latitude
    /// (all radians).
    pub fn from_ramc(ramc: f64, obliquity: f64, latitude: f64) -> Self {
        let (sin_r, cos_r) = ramc.sin_cos();
        let (sin_e, cos_e) = obliquity.sin_cos();

        let midheaven = sin_r.atan2(cos_r * cos_e).to_degrees();
        let ascendant = cos_r
            .atan2(-(sin_e * latitude.tan() + cos_e * sin_r))
            .to_degrees();

        Self {
            ascendant: normalize_degrees(ascendant),
            midheaven: normalize_degrees(midheaven),
        }
    }

    pub fn descendant(&self) -> f64 {
        normalize_degrees(self.ascendant + 180.0)
    }

    pub fn imum_coeli(&self) -> f64 {
        normalize_degrees(self.midheaven + 180.0)
    }
}
