//! Transit window estimates.
//!
//! A deliberate approximation: the window is `2 × max orb / mean velocity`,
//! centred on the reference instant. No ingress/egress root finding is done.

use crate::aspects::{AspectKind, AspectMatch, AspectTable, DEFAULT_EXACT_ORB};
use crate::ephemeris::types::{Body, ChartPoint};
use crate::error::{AstroError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

lazy_static::lazy_static! {
    /// Mean geocentric longitude speed in degrees per day.
    static ref MEAN_VELOCITIES: HashMap<Body, f64> = {
        let mut m = HashMap::new();
        m.insert(Body::Sun, 0.9856);
        m.insert(Body::Moon, 13.1764);
        m.insert(Body::Mercury, 1.383);
        m.insert(Body::Venus, 1.2);
        m.insert(Body::Mars, 0.524);
        m.insert(Body::Jupiter, 0.083);
        m.insert(Body::Saturn, 0.0335);
        m.insert(Body::Uranus, 0.0117);
        m.insert(Body::Neptune, 0.006);
        m.insert(Body::Pluto, 0.004);
        m.insert(Body::NorthNode, 0.053);
        m.insert(Body::SouthNode, 0.053);
        m
    };
}

/// Mean speed of a body in degrees per day.
pub fn mean_velocity(body: Body) -> f64 {
    MEAN_VELOCITIES.get(&body).copied().unwrap_or(1.0)
}

/// Estimated activity window around a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The reference instant, when the orb there is within the exact threshold
    pub exact_date: Option<DateTime<Utc>>,
    /// Current orb within the maximum orb
    pub active: bool,
}

impl TransitWindow {
    pub fn width_days(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 86_400_000.0
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Window for a transiting body against a natal point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitPeriod {
    pub transiting: Body,
    pub natal: ChartPoint,
    pub kind: AspectKind,
    pub current_orb: f64,
    pub window: TransitWindow,
}

/// Window from an explicit velocity (degrees/day) and maximum orb.
pub fn estimate_window(
    velocity: f64,
    max_orb: f64,
    reference: DateTime<Utc>,
    current_orb: f64,
    exact_orb: f64,
) -> Result<TransitWindow> {
    let velocity = velocity.abs();
    if !velocity.is_finite() || velocity == 0.0 {
        return Err(AstroError::invalid_input(format!(
            "transit velocity must be finite and non-zero, got {}",
            velocity
        )));
    }
    if !max_orb.is_finite() || max_orb < 0.0 || !current_orb.is_finite() {
        return Err(AstroError::invalid_input(format!(
            "orbs must be finite (max {}, current {})",
            max_orb, current_orb
        )));
    }

    let half_days = max_orb / velocity;
    let half = Duration::try_milliseconds((half_days * 86_400_000.0).round() as i64)
        .ok_or_else(|| AstroError::invalid_input("transit window out of range"))?;
    let start = reference
        .checked_sub_signed(half)
        .ok_or_else(|| AstroError::invalid_input("transit window start out of range"))?;
    let end = reference
        .checked_add_signed(half)
        .ok_or_else(|| AstroError::invalid_input("transit window end out of range"))?;

    let orb = current_orb.abs();
    Ok(TransitWindow {
        start,
        end,
        exact_date: (orb <= exact_orb).then_some(reference),
        active: orb <= max_orb,
    })
}

/// Estimates transit windows against an aspect table.
#[derive(Debug, Clone)]
pub struct TransitEstimator {
    table: AspectTable,
    exact_orb: f64,
}

impl TransitEstimator {
    pub fn new(table: AspectTable, exact_orb: f64) -> Self {
        Self { table, exact_orb }
    }

    pub fn estimate(
        &self,
        transiting: Body,
        natal: ChartPoint,
        kind: AspectKind,
        reference: DateTime<Utc>,
        current_orb: f64,
    ) -> Result<TransitPeriod> {
        let def = self.table.get(kind).ok_or_else(|| {
            AstroError::invalid_input(format!("aspect {} is not in the table", kind))
        })?;
        let window = estimate_window(
            mean_velocity(transiting),
            def.max_orb,
            reference,
            current_orb,
            self.exact_orb,
        )?;
        Ok(TransitPeriod {
            transiting,
            natal,
            kind,
            current_orb,
            window,
        })
    }

    /// Window for a detected transit match. `a` must be the transiting body.
    pub fn estimate_match(&self, m: &AspectMatch, reference: DateTime<Utc>) -> Result<TransitPeriod> {
        match m.a {
            ChartPoint::Body(body) => self.estimate(body, m.b, m.kind, reference, m.orb),
            ChartPoint::Angle(angle) => Err(AstroError::invalid_input(format!(
                "{} cannot be a transiting point",
                angle.slug()
            ))),
        }
    }
}

/// Estimate with the default exact threshold.
pub fn estimate_transit_period(
    transiting: Body,
    natal: ChartPoint,
    kind: AspectKind,
    reference: DateTime<Utc>,
    current_orb: f64,
    table: &AspectTable,
) -> Result<TransitPeriod> {
    TransitEstimator::new(table.clone(), DEFAULT_EXACT_ORB).estimate(
        transiting,
        natal,
        kind,
        reference,
        current_orb,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_one_degree_per_day_eight_degree_orb() {
        let w = estimate_window(1.0, 8.0, reference(), 2.0, 0.1).unwrap();
        assert!((w.width_days() - 16.0).abs() < 1e-9);
        assert_eq!(w.start, reference() - Duration::days(8));
        assert!(w.active);
        assert!(w.exact_date.is_none());
    }

    #[test]
    fn test_exact_and_inactive() {
        let w = estimate_window(1.0, 8.0, reference(), -0.05, 0.1).unwrap();
        assert_eq!(w.exact_date, Some(reference()));
        let w = estimate_window(1.0, 8.0, reference(), 9.0, 0.1).unwrap();
        assert!(!w.active);
    }

    #[test]
    fn test_zero_velocity_rejected() {
        assert!(estimate_window(0.0, 8.0, reference(), 0.0, 0.1).is_err());
        assert!(estimate_window(f64::NAN, 8.0, reference(), 0.0, 0.1).is_err());
    }

    #[test]
    fn test_sun_square_window() {
        let period = estimate_transit_period(
            Body::Sun,
            ChartPoint::Body(Body::Moon),
            AspectKind::Square,
            reference(),
            1.0,
            &AspectTable::major(),
        )
        .unwrap();
        // 2 × 6 / 0.9856
        assert!((period.window.width_days() - 12.175_32).abs() < 1e-3);
        assert!(period.window.contains(reference()));
    }

    #[test]
    fn test_kind_missing_from_table() {
        let err = estimate_transit_period(
            Body::Mars,
            ChartPoint::Body(Body::Sun),
            AspectKind::Quincunx,
            reference(),
            0.0,
            &AspectTable::major(),
        );
        assert!(err.is_err());
    }
}
