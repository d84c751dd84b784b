//! Zodiac signs and house placement.
//!
//! Whole-sign houses use sign boundaries as house boundaries. Any other
//! system is expressed as twelve cusp longitudes and resolved with the same
//! modular distance rule against those cusps.

use crate::error::{AstroError, Result};
use crate::time::normalize_degrees;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl Sign {
    pub const ALL: [Sign; 12] = [
        Sign::Aries,
        Sign::Taurus,
        Sign::Gemini,
        Sign::Cancer,
        Sign::Leo,
        Sign::Virgo,
        Sign::Libra,
        Sign::Scorpio,
        Sign::Sagittarius,
        Sign::Capricorn,
        Sign::Aquarius,
        Sign::Pisces,
    ];

    /// Sign containing an ecliptic longitude (any real value).
    pub fn from_longitude(longitude: f64) -> Self {
        let idx = (normalize_degrees(longitude) / 30.0).floor() as usize;
        Self::ALL[idx.min(11)]
    }

    /// 0 for Aries through 11 for Pisces.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Longitude where the sign begins.
    pub fn start_longitude(self) -> f64 {
        f64::from(self.index()) * 30.0
    }

    pub fn name(self) -> &'static str {
        match self {
            Sign::Aries => "aries",
            Sign::Taurus => "taurus",
            Sign::Gemini => "gemini",
            Sign::Cancer => "cancer",
            Sign::Leo => "leo",
            Sign::Virgo => "virgo",
            Sign::Libra => "libra",
            Sign::Scorpio => "scorpio",
            Sign::Sagittarius => "sagittarius",
            Sign::Capricorn => "capricorn",
            Sign::Aquarius => "aquarius",
            Sign::Pisces => "pisces",
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// House system used to derive cusps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HouseSystem {
    #[default]
    WholeSign,
    /// Cusp n = ASC + 30°·(n−1)
    Equal,
    /// Cusps supplied by the caller (e.g. Placidus from an upstream provider)
    External([f64; 12]),
}

impl HouseSystem {
    /// Cusp longitudes for an ascendant. External cusps ignore it.
    pub fn cusps(&self, ascendant: f64) -> [f64; 12] {
        let start = match self {
            HouseSystem::WholeSign => Sign::from_longitude(ascendant).start_longitude(),
            HouseSystem::Equal => normalize_degrees(ascendant),
            HouseSystem::External(cusps) => return cusps.map(normalize_degrees),
        };
        std::array::from_fn(|n| normalize_degrees(start + 30.0 * n as f64))
    }

    pub fn validate(&self) -> Result<()> {
        if let HouseSystem::External(cusps) = self {
            if cusps.iter().any(|c| !c.is_finite()) {
                return Err(AstroError::invalid_input("house cusps must be finite"));
            }
        }
        Ok(())
    }
}

/// Sign, degree within sign and house for one longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignPlacement {
    pub sign: Sign,
    /// In [0, 30)
    pub degree_in_sign: f64,
    /// In [1, 12]
    pub house: u8,
}

/// Sign and degree-in-sign for a longitude.
pub fn resolve_sign(longitude: f64) -> (Sign, f64) {
    let lon = normalize_degrees(longitude);
    let sign = Sign::from_longitude(lon);
    // floor() can land one sign late when lon sits a rounding error below a boundary
    (sign, (lon - sign.start_longitude()).max(0.0))
}

/// Whole-sign placement: the ascendant's sign is the first house.
pub fn resolve_sign_house(longitude: f64, ascendant: f64) -> SignPlacement {
    let (sign, degree_in_sign) = resolve_sign(longitude);
    let asc_sign = Sign::from_longitude(ascendant);
    let house = (i32::from(sign.index()) - i32::from(asc_sign.index()) + 1).rem_euclid(12);
    SignPlacement {
        sign,
        degree_in_sign,
        house: if house == 0 { 12 } else { house as u8 },
    }
}

/// House whose cusp was most recently passed going forward in longitude.
///
/// For cusps in zodiacal order this is the arc `[cusp n, cusp n+1)` that
/// contains the longitude, wrapping through 0°.
pub fn resolve_house_with_cusps(longitude: f64, cusps: &[f64; 12]) -> u8 {
    let lon = normalize_degrees(longitude);
    let mut best = 0;
    let mut best_offset = f64::INFINITY;
    for (i, cusp) in cusps.iter().enumerate() {
        let offset = normalize_degrees(lon - cusp);
        if offset < best_offset {
            best_offset = offset;
            best = i;
        }
    }
    best as u8 + 1
}

/// Placement under any house system.
pub fn resolve_placement(longitude: f64, ascendant: f64, system: &HouseSystem) -> SignPlacement {
    match system {
        HouseSystem::WholeSign => resolve_sign_house(longitude, ascendant),
        other => {
            let (sign, degree_in_sign) = resolve_sign(longitude);
            SignPlacement {
                sign,
                degree_in_sign,
                house: resolve_house_with_cusps(longitude, &other.cusps(ascendant)),
            }
        }
    }
}
