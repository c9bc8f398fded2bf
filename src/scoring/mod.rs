pub mod templates;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub use templates::{RubricTemplate, TEMPLATES, default_template, resolve_template};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 5.0;

/// One of the six scored rubric dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Criterion {
    Estructura,
    Programacion,
    Teoria,
    Ia,
    Reflexion,
    Presentacion,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::Estructura,
        Criterion::Programacion,
        Criterion::Teoria,
        Criterion::Ia,
        Criterion::Reflexion,
        Criterion::Presentacion,
    ];

    /// Column name in the `evaluaciones` table and in every CSV.
    pub fn column(self) -> &'static str {
        match self {
            Criterion::Estructura => "estructura",
            Criterion::Programacion => "programacion",
            Criterion::Teoria => "teoria",
            Criterion::Ia => "ia",
            Criterion::Reflexion => "reflexion",
            Criterion::Presentacion => "presentacion",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Criterion::ALL
            .into_iter()
            .find(|c| c.column() == wanted)
            .ok_or_else(|| format!("unknown criterion '{s}'"))
    }
}

/// Scores keyed by criterion. Absent criteria are excluded from the final score.
pub type Scores = BTreeMap<Criterion, f64>;

/// Integer percent weights keyed by criterion.
pub type Weights = BTreeMap<Criterion, u32>;

/// Check every present score is a finite number within [1.0, 5.0].
pub fn validate(scores: &Scores) -> Result<(), ValidationError> {
    for (&criterion, &value) in scores {
        if !value.is_finite() {
            return Err(ValidationError::NotNumeric {
                criterion,
                value: value.to_string(),
            });
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(ValidationError::OutOfRange { criterion, value });
        }
    }
    Ok(())
}

/// Parse raw text input (form field, CSV cell) into a score value.
///
/// Range is not checked here; run [`validate`] on the collected scores.
pub fn parse_score(criterion: Criterion, raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::NotNumeric {
            criterion,
            value: trimmed.to_string(),
        }),
    }
}

/// Weighted final score: `round(Σ score * weight / 100, 2)` over criteria present
/// in both maps. `None` weights means the default template.
///
/// An empty score set is 0.0 and is not validated.
pub fn compute_final(scores: &Scores, weights: Option<&Weights>) -> Result<f64, ValidationError> {
    if scores.is_empty() {
        return Ok(0.0);
    }

    validate(scores)?;

    let default_weights;
    let weights = match weights {
        Some(w) => w,
        None => {
            default_weights = default_template().weights();
            &default_weights
        }
    };

    let total: f64 = weights
        .iter()
        .filter_map(|(criterion, &weight)| {
            scores
                .get(criterion)
                .map(|score| score * (weight as f64 / 100.0))
        })
        .sum();

    Ok(round_to_cents(total))
}

/// Round to 2 decimals on the exact decimal value of `value`, ties to even.
///
/// `2.675` is stored as `2.67499999...` and rounds to `2.67`.
pub fn round_to_cents(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

/// Qualitative meaning of each integer score level.
pub const LEVELS: [(u8, &str); 5] = [
    (1, "Deficiente"),
    (2, "Básico"),
    (3, "Aceptable"),
    (4, "Bueno"),
    (5, "Excelente"),
];

/// One-line legend, e.g. `1=Deficiente · 2=Básico · ...`.
pub fn levels_legend() -> String {
    LEVELS
        .iter()
        .map(|(level, label)| format!("{level}={label}"))
        .collect::<Vec<_>>()
        .join(" · ")
}
