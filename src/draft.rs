use crate::error::ValidationError;
use crate::records::NewEvaluation;
use crate::scoring::{self, Scores};

/// Form state held by the caller between interactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationDraft {
    pub template: String,
    pub course: String,
    pub evaluation: String,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
    pub subject: String,
    pub scores: Scores,
    pub observations: String,
}

/// Live final score for display. A failed computation shows 0.0 and a warning
/// instead of an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorePreview {
    pub value: f64,
    pub warning: Option<String>,
}

impl EvaluationDraft {
    pub fn preview(&self) -> ScorePreview {
        let weights = scoring::resolve_template(&self.template).weights();
        match scoring::compute_final(&self.scores, Some(&weights)) {
            Ok(value) => ScorePreview { value, warning: None },
            Err(e) => ScorePreview {
                value: 0.0,
                warning: Some(format!(
                    "Could not compute the final score: {e}. Check every score is between 1 and 5."
                )),
            },
        }
    }

    /// Validated insert payload with the computed final score.
    pub fn to_new_evaluation(&self) -> Result<NewEvaluation, ValidationError> {
        let template = scoring::resolve_template(&self.template);
        let final_score = scoring::compute_final(&self.scores, Some(&template.weights()))?;
        Ok(NewEvaluation {
            template: Some(self.template.clone()),
            course: Some(self.course.trim().to_string()),
            evaluation: Some(self.evaluation.trim().to_string()),
            date: Some(self.date.clone()),
            subject: Some(self.subject.clone()),
            final_score: Some(final_score),
            observations: Some(self.observations.trim().to_string()),
            ..Default::default()
        }
        .with_scores(&self.scores))
    }
}

/// Non-empty trimmed lines of a roster text; `-` when there are none.
pub fn roster_entries(roster_text: &str) -> Vec<String> {
    let entries: Vec<String> = roster_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    if entries.is_empty() {
        vec!["-".to_string()]
    } else {
        entries
    }
}

/// One unscored placeholder per roster entry, sharing the draft's header fields.
pub fn roster_placeholders(header: &EvaluationDraft, roster_text: &str) -> Vec<NewEvaluation> {
    roster_entries(roster_text)
        .into_iter()
        .map(|subject| NewEvaluation {
            template: Some(header.template.clone()),
            course: Some(header.course.trim().to_string()),
            evaluation: Some(header.evaluation.trim().to_string()),
            date: Some(header.date.clone()),
            subject: Some(subject),
            final_score: Some(0.0),
            observations: Some(String::new()),
            ..Default::default()
        })
        .collect()
}
