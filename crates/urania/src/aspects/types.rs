use crate::ephemeris::types::ChartPoint;
use crate::error::{AstroError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Aspect kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectKind {
    Conjunction,
    Opposition,
    Trine,
    Square,
    Sextile,
    Quincunx,
    Sesquiquadrate,
    SemiSquare,
    SemiSextile,
}

impl AspectKind {
    /// Tie-break order when two kinds match a pair with exactly the same orb.
    /// Earlier wins.
    pub const PRIORITY: [AspectKind; 9] = [
        AspectKind::Conjunction,
        AspectKind::Opposition,
        AspectKind::Trine,
        AspectKind::Square,
        AspectKind::Sextile,
        AspectKind::Quincunx,
        AspectKind::Sesquiquadrate,
        AspectKind::SemiSquare,
        AspectKind::SemiSextile,
    ];

    pub const MAJOR: [AspectKind; 5] = [
        AspectKind::Conjunction,
        AspectKind::Opposition,
        AspectKind::Trine,
        AspectKind::Square,
        AspectKind::Sextile,
    ];

    /// Exact angle in degrees
    pub fn angle(self) -> f64 {
        match self {
            AspectKind::Conjunction => 0.0,
            AspectKind::Opposition => 180.0,
            AspectKind::Trine => 120.0,
            AspectKind::Square => 90.0,
            AspectKind::Sextile => 60.0,
            AspectKind::Quincunx => 150.0,
            AspectKind::Sesquiquadrate => 135.0,
            AspectKind::SemiSquare => 45.0,
            AspectKind::SemiSextile => 30.0,
        }
    }

    pub fn default_orb(self) -> f64 {
        match self {
            AspectKind::Conjunction | AspectKind::Opposition => 8.0,
            AspectKind::Trine => 7.0,
            AspectKind::Square => 6.0,
            AspectKind::Sextile => 4.0,
            AspectKind::Quincunx => 3.0,
            AspectKind::Sesquiquadrate | AspectKind::SemiSquare | AspectKind::SemiSextile => 2.0,
        }
    }

    pub fn is_major(self) -> bool {
        Self::MAJOR.contains(&self)
    }

    /// Position in [`PRIORITY`](Self::PRIORITY).
    pub fn priority_rank(self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|k| *k == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    pub fn name(self) -> &'static str {
        match self {
            AspectKind::Conjunction => "conjunction",
            AspectKind::Opposition => "opposition",
            AspectKind::Trine => "trine",
            AspectKind::Square => "square",
            AspectKind::Sextile => "sextile",
            AspectKind::Quincunx => "quincunx",
            AspectKind::Sesquiquadrate => "sesquiquadrate",
            AspectKind::SemiSquare => "semi_square",
            AspectKind::SemiSextile => "semi_sextile",
        }
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AspectKind {
    type Err = AstroError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase().replace(['-', ' '], "_");
        let kind = match lower.as_str() {
            "conjunction" => AspectKind::Conjunction,
            "opposition" => AspectKind::Opposition,
            "trine" => AspectKind::Trine,
            "square" => AspectKind::Square,
            "sextile" => AspectKind::Sextile,
            "quincunx" | "inconjunct" => AspectKind::Quincunx,
            "sesquiquadrate" | "sesquisquare" => AspectKind::Sesquiquadrate,
            "semi_square" | "semisquare" => AspectKind::SemiSquare,
            "semi_sextile" | "semisextile" => AspectKind::SemiSextile,
            _ => return Err(AstroError::invalid_input(format!("Unknown aspect kind: {}", s))),
        };
        Ok(kind)
    }
}

/// One row of an aspect table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectDefinition {
    pub kind: AspectKind,
    /// Exact angle in degrees
    pub angle: f64,
    /// Maximum allowed deviation from `angle`, degrees
    pub max_orb: f64,
}

impl AspectDefinition {
    pub fn new(kind: AspectKind, max_orb: f64) -> Self {
        Self {
            kind,
            angle: kind.angle(),
            max_orb,
        }
    }
}

/// Validated, immutable set of aspect definitions, kept in priority order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AspectTable {
    definitions: Vec<AspectDefinition>,
}

impl AspectTable {
    pub fn new(mut definitions: Vec<AspectDefinition>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for def in &definitions {
            if !def.max_orb.is_finite() || def.max_orb < 0.0 {
                return Err(AstroError::InvalidAspectTable {
                    message: format!("orb for {} must be finite and >= 0, got {}", def.kind, def.max_orb),
                });
            }
            if !def.angle.is_finite() || !(0.0..=180.0).contains(&def.angle) {
                return Err(AstroError::InvalidAspectTable {
                    message: format!("angle for {} must be within [0, 180], got {}", def.kind, def.angle),
                });
            }
            if !seen.insert(def.kind) {
                return Err(AstroError::InvalidAspectTable {
                    message: format!("duplicate definition for {}", def.kind),
                });
            }
        }
        definitions.sort_by_key(|d| d.kind.priority_rank());
        Ok(Self { definitions })
    }

    /// The five major aspects with default orbs.
    pub fn major() -> Self {
        Self {
            definitions: AspectKind::MAJOR
                .iter()
                .map(|k| AspectDefinition::new(*k, k.default_orb()))
                .collect(),
        }
    }

    /// Major and minor aspects with default orbs.
    pub fn with_minor() -> Self {
        Self {
            definitions: AspectKind::PRIORITY
                .iter()
                .map(|k| AspectDefinition::new(*k, k.default_orb()))
                .collect(),
        }
    }

    pub fn definitions(&self) -> &[AspectDefinition] {
        &self.definitions
    }

    pub fn get(&self, kind: AspectKind) -> Option<&AspectDefinition> {
        self.definitions.iter().find(|d| d.kind == kind)
    }

    /// Largest orb in the table, 0 if empty.
    pub fn max_orb(&self) -> f64 {
        self.definitions.iter().map(|d| d.max_orb).fold(0.0, f64::max)
    }
}

impl Default for AspectTable {
    fn default() -> Self {
        Self::major()
    }
}

/// A point entering aspect search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectPoint {
    pub point: ChartPoint,
    pub longitude: f64,
    /// Degrees per day, when known
    pub speed: Option<f64>,
}

impl AspectPoint {
    pub fn new(point: impl Into<ChartPoint>, longitude: f64) -> Self {
        Self {
            point: point.into(),
            longitude,
            speed: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// A detected aspect between two points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectMatch {
    pub a: ChartPoint,
    pub b: ChartPoint,
    pub kind: AspectKind,
    /// Angular separation in [0, 180]
    pub separation: f64,
    /// `separation - exact angle`; negative when the pair is inside the exact angle
    pub orb: f64,
    /// Approaching exactness; `None` when either speed is unknown
    pub applying: Option<bool>,
    pub exact: bool,
}

impl AspectMatch {
    pub fn abs_orb(&self) -> f64 {
        self.orb.abs()
    }

    /// Same match seen from the other side.
    pub fn swapped(&self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            ..*self
        }
    }
}
