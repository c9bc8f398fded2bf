use serde::Serialize;

use crate::scoring::{Criterion, Scores};

/// A persisted evaluation, every column of `evaluaciones`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub id: i64,
    #[serde(rename = "plantilla")]
    pub template: Option<String>,
    #[serde(rename = "curso")]
    pub course: Option<String>,
    #[serde(rename = "evaluacion")]
    pub evaluation: Option<String>,
    #[serde(rename = "fecha")]
    pub date: Option<String>,
    #[serde(rename = "grupo_o_estudiante")]
    pub subject: Option<String>,
    #[serde(rename = "estructura")]
    pub structure: Option<f64>,
    #[serde(rename = "programacion")]
    pub programming: Option<f64>,
    #[serde(rename = "teoria")]
    pub theory: Option<f64>,
    #[serde(rename = "ia")]
    pub ai_usage: Option<f64>,
    #[serde(rename = "reflexion")]
    pub reflection: Option<f64>,
    #[serde(rename = "presentacion")]
    pub presentation: Option<f64>,
    #[serde(rename = "nota_final")]
    pub final_score: Option<f64>,
    #[serde(rename = "observaciones")]
    pub observations: Option<String>,
    pub created_at: Option<String>,
}

impl Evaluation {
    /// The criterion scores that are present.
    pub fn scores(&self) -> Scores {
        collect_scores([
            self.structure,
            self.programming,
            self.theory,
            self.ai_usage,
            self.reflection,
            self.presentation,
        ])
    }

    pub fn summary(&self) -> Summary {
        Summary {
            id: self.id,
            date: self.date.clone(),
            subject: self.subject.clone(),
            final_score: self.final_score,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            course: self.course.clone().unwrap_or_default(),
            evaluation: self.evaluation.clone().unwrap_or_default(),
            date: self.date.clone().unwrap_or_default(),
            subject: self.subject.clone().unwrap_or_default(),
        }
    }
}

/// Insert payload. Each `None` column is left NULL in storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEvaluation {
    pub template: Option<String>,
    pub course: Option<String>,
    pub evaluation: Option<String>,
    pub date: Option<String>,
    pub subject: Option<String>,
    pub structure: Option<f64>,
    pub programming: Option<f64>,
    pub theory: Option<f64>,
    pub ai_usage: Option<f64>,
    pub reflection: Option<f64>,
    pub presentation: Option<f64>,
    pub final_score: Option<f64>,
    pub observations: Option<String>,
}

impl NewEvaluation {
    /// Set the criterion fields from a score map; criteria absent from the map
    /// are cleared.
    pub fn with_scores(mut self, scores: &Scores) -> Self {
        self.structure = scores.get(&Criterion::Estructura).copied();
        self.programming = scores.get(&Criterion::Programacion).copied();
        self.theory = scores.get(&Criterion::Teoria).copied();
        self.ai_usage = scores.get(&Criterion::Ia).copied();
        self.reflection = scores.get(&Criterion::Reflexion).copied();
        self.presentation = scores.get(&Criterion::Presentacion).copied();
        self
    }

    pub fn scores(&self) -> Scores {
        collect_scores([
            self.structure,
            self.programming,
            self.theory,
            self.ai_usage,
            self.reflection,
            self.presentation,
        ])
    }

    /// True when no column at all is supplied.
    pub fn is_empty(&self) -> bool {
        *self == NewEvaluation::default()
    }
}

fn collect_scores(values: [Option<f64>; 6]) -> Scores {
    Criterion::ALL
        .into_iter()
        .zip(values)
        .filter_map(|(criterion, value)| value.map(|v| (criterion, v)))
        .collect()
}

/// Lightweight listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub id: i64,
    pub date: Option<String>,
    pub subject: Option<String>,
    pub final_score: Option<f64>,
}

/// (course, evaluation, date, subject), used to deduplicate imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub course: String,
    pub evaluation: String,
    pub date: String,
    pub subject: String,
}

/// Ordering by date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Order evaluations by date then id, in this direction.
    pub fn sort(self, records: &mut [Evaluation]) {
        records.sort_by(|a, b| {
            let ord = a.date.cmp(&b.date).then(a.id.cmp(&b.id));
            match self {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            other => Err(format!("sort order must be ASC or DESC, got '{other}'")),
        }
    }
}

/// Filters for a detailed listing. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFilter {
    /// Case-insensitive substring of course, evaluation, subject or observations.
    pub text: Option<String>,
    /// Exact match against the stored date string.
    pub date: Option<String>,
    pub order: SortOrder,
}

impl DetailFilter {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref().filter(|d| !d.is_empty())
    }

    /// Whether the record passes the text filter.
    pub fn matches_text(&self, record: &Evaluation) -> bool {
        let Some(needle) = self.text() else {
            return true;
        };
        let needle = needle.to_lowercase();
        [
            &record.course,
            &record.evaluation,
            &record.subject,
            &record.observations,
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Whether the record passes both filters.
    pub fn matches(&self, record: &Evaluation) -> bool {
        let date_ok = match self.date() {
            Some(date) => record.date.as_deref() == Some(date),
            None => true,
        };
        date_ok && self.matches_text(record)
    }
}
