use crate::aspects::types::{AspectDefinition, AspectMatch, AspectPoint, AspectTable};
use crate::time::angle_difference;

/// Orb at or below which an aspect counts as exact.
pub const DEFAULT_EXACT_ORB: f64 = 0.1;

/// Angular separation of two longitudes, in [0, 180].
pub fn angular_separation(lon1: f64, lon2: f64) -> f64 {
    let raw = (lon1 - lon2).rem_euclid(360.0);
    if raw > 180.0 {
        360.0 - raw
    } else {
        raw
    }
}

/// Aspect calculator over an immutable table
#[derive(Debug, Clone)]
pub struct AspectCalculator {
    table: AspectTable,
    exact_orb: f64,
}

impl AspectCalculator {
    pub fn new(table: AspectTable) -> Self {
        Self {
            table,
            exact_orb: DEFAULT_EXACT_ORB,
        }
    }

    pub fn with_exact_orb(mut self, exact_orb: f64) -> Self {
        self.exact_orb = exact_orb;
        self
    }

    pub fn table(&self) -> &AspectTable {
        &self.table
    }

    /// Best matching aspect for one pair, if any.
    ///
    /// The smallest absolute orb wins. Definitions are iterated in
    /// [`AspectKind::PRIORITY`](crate::aspects::AspectKind::PRIORITY) order and
    /// only a strictly smaller orb replaces the current candidate, so exact
    /// ties go to the higher-priority kind.
    pub fn best_aspect(&self, a: &AspectPoint, b: &AspectPoint) -> Option<AspectMatch> {
        let separation = angular_separation(a.longitude, b.longitude);

        let mut best: Option<(f64, &AspectDefinition)> = None;
        for def in self.table.definitions() {
            let orb = separation - def.angle;
            if orb.abs() > def.max_orb {
                continue;
            }
            match best {
                Some((current, _)) if orb.abs() >= current.abs() => {}
                _ => best = Some((orb, def)),
            }
        }

        best.map(|(orb, def)| AspectMatch {
            a: a.point,
            b: b.point,
            kind: def.kind,
            separation,
            orb,
            applying: match (a.speed, b.speed) {
                (Some(sa), Some(sb)) => Some(is_applying(a.longitude, b.longitude, sa, sb, orb)),
                _ => None,
            },
            exact: orb.abs() <= self.exact_orb,
        })
    }

    /// All distinct unordered pairs within one list.
    pub fn natal(&self, points: &[AspectPoint]) -> Vec<AspectMatch> {
        let points = searchable(points);
        let mut matches = Vec::new();
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                if points[i].point == points[j].point {
                    continue;
                }
                if let Some(m) = self.best_aspect(points[i], points[j]) {
                    matches.push(m);
                }
            }
        }
        sort_matches(&mut matches);
        matches
    }

    /// Every pair with one point from each list. `a` is always the first
    /// list's point.
    pub fn cross(&self, a: &[AspectPoint], b: &[AspectPoint]) -> Vec<AspectMatch> {
        let a = searchable(a);
        let b = searchable(b);
        let mut matches = Vec::new();
        for pa in &a {
            for pb in &b {
                if let Some(m) = self.best_aspect(pa, pb) {
                    matches.push(m);
                }
            }
        }
        sort_matches(&mut matches);
        matches
    }

    /// Natal search when both arguments are the same slice, cross search
    /// otherwise.
    ///
    /// Sameness is by identity, not content: two separately built charts
    /// that happen to hold equal positions still get a cross search.
    pub fn detect(&self, a: &[AspectPoint], b: &[AspectPoint]) -> Vec<AspectMatch> {
        if std::ptr::eq(a, b) {
            self.natal(a)
        } else {
            self.cross(a, b)
        }
    }
}

/// Detect aspects between two position lists, tightest first.
///
/// Pass the same slice twice for a natal chart; see [`AspectCalculator::detect`].
pub fn detect_aspects(a: &[AspectPoint], b: &[AspectPoint], table: &AspectTable) -> Vec<AspectMatch> {
    AspectCalculator::new(table.clone()).detect(a, b)
}

/// Ascending absolute orb, then kind priority, then point order.
pub fn sort_matches(matches: &mut [AspectMatch]) {
    matches.sort_by(|x, y| {
        x.abs_orb()
            .total_cmp(&y.abs_orb())
            .then_with(|| x.kind.priority_rank().cmp(&y.kind.priority_rank()))
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });
}

/// Points that take part in pairwise search: derived mirrors (descendant,
/// IC, south node) and non-finite longitudes are left out.
fn searchable(points: &[AspectPoint]) -> Vec<&AspectPoint> {
    points
        .iter()
        .filter(|p| {
            if !p.longitude.is_finite() {
                log::debug!("Skipping {} with non-finite longitude", p.point);
                return false;
            }
            !p.point.is_derived()
        })
        .collect()
}

/// Whether |orb| is shrinking given both longitude speeds.
fn is_applying(lon_a: f64, lon_b: f64, speed_a: f64, speed_b: f64, orb: f64) -> bool {
    if orb == 0.0 {
        return false;
    }
    let delta = angle_difference(lon_a, lon_b);
    // rate of change of the separation |delta|
    let separation_rate = if delta >= 0.0 {
        speed_a - speed_b
    } else {
        speed_b - speed_a
    };
    orb.signum() * separation_rate < 0.0
}
