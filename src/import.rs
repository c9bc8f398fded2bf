//! Bulk loading of evaluations from an external CSV file.
//!
//! Rows are validated with the same rules as interactive entry, deduplicated
//! on the natural key (curso, evaluacion, fecha, grupo_o_estudiante) and
//! inserted one by one. A missing file or missing column aborts the run before
//! anything is written; a bad row is logged and skipped.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::db::Database;
use crate::error::{ImportError, StorageError, ValidationError};
use crate::records::{NaturalKey, NewEvaluation};
use crate::scoring::{self, Criterion, Scores};

pub const REQUIRED_COLUMNS: [&str; 11] = [
    "curso",
    "evaluacion",
    "fecha",
    "grupo_o_estudiante",
    "estructura",
    "programacion",
    "teoria",
    "ia",
    "reflexion",
    "presentacion",
    "observaciones",
];

const FINAL_SCORE_COLUMN: &str = "nota_final";

/// A row that made it into the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertedRow {
    pub id: i64,
    pub curso: String,
    pub evaluacion: String,
    pub fecha: String,
    pub grupo_o_estudiante: String,
    pub nota_final: f64,
    pub created_at: String,
}

/// A row left out because its natural key already exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub existing_id: i64,
    pub key: NaturalKey,
    pub existing_final_score: Option<f64>,
}

/// Aggregate over inserted rows. Stats are `None` when nothing was inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub inserted_count: usize,
    pub skipped_count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ImportSummary {
    fn from_rows(inserted: &[InsertedRow], skipped: usize) -> Self {
        let scores: Vec<f64> = inserted.iter().map(|r| r.nota_final).collect();
        let (average, min, max) = if scores.is_empty() {
            (None, None, None)
        } else {
            let avg = scores.iter().sum::<f64>() / scores.len() as f64;
            (
                Some(scoring::round_to_cents(avg)),
                scores.iter().copied().reduce(f64::min),
                scores.iter().copied().reduce(f64::max),
            )
        };
        Self {
            inserted_count: inserted.len(),
            skipped_count: skipped,
            average,
            min,
            max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub inserted: Vec<InsertedRow>,
    pub skipped: Vec<SkippedRow>,
    /// Rows dropped for failing validation.
    pub rejected: usize,
    /// Rows that passed validation but could not be written.
    pub failed: usize,
    pub summary: ImportSummary,
    pub report_path: PathBuf,
    pub summary_path: PathBuf,
}

/// A validated input row, ready to insert.
#[derive(Debug, Clone, PartialEq)]
struct ImportRow {
    key: NaturalKey,
    scores: Scores,
    final_score: f64,
    observations: String,
}

impl ImportRow {
    fn to_new_evaluation(&self) -> NewEvaluation {
        NewEvaluation {
            course: Some(self.key.course.clone()),
            evaluation: Some(self.key.evaluation.clone()),
            date: Some(self.key.date.clone()),
            subject: Some(self.key.subject.clone()),
            final_score: Some(self.final_score),
            observations: Some(self.observations.clone()),
            ..Default::default()
        }
        .with_scores(&self.scores)
    }
}

/// Column name → index, built from the header.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, ValidationError> {
        let map: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !map.contains_key(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(missing));
        }
        Ok(Self(map))
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: &str) -> &'r str {
        self.0
            .get(column)
            .and_then(|&i| record.get(i))
            .unwrap_or_default()
    }
}

fn parse_row(columns: &Columns, record: &csv::StringRecord) -> Result<ImportRow, ValidationError> {
    let mut scores = Scores::new();
    for criterion in Criterion::ALL {
        let value = scoring::parse_score(criterion, columns.get(record, criterion.column()))?;
        scores.insert(criterion, value);
    }
    scoring::validate(&scores)?;

    let date = columns.get(record, "fecha").trim();
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(ValidationError::InvalidDate {
            field: "fecha",
            value: date.to_string(),
        });
    }

    let supplied = columns.get(record, FINAL_SCORE_COLUMN).trim();
    let final_score = if supplied.is_empty() {
        scoring::compute_final(&scores, None)?
    } else {
        supplied
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationError::InvalidNumber {
                field: FINAL_SCORE_COLUMN,
                value: supplied.to_string(),
            })?
    };

    Ok(ImportRow {
        key: NaturalKey {
            course: columns.get(record, "curso").to_string(),
            evaluation: columns.get(record, "evaluacion").to_string(),
            date: date.to_string(),
            subject: columns.get(record, "grupo_o_estudiante").to_string(),
        },
        scores,
        final_score,
        observations: columns.get(record, "observaciones").to_string(),
    })
}

/// Load `csv_path` into `db` and write the insert report and summary next to it.
pub fn import_csv(db: &Database, csv_path: &Path) -> Result<ImportOutcome, ImportError> {
    if !csv_path.is_file() {
        return Err(ImportError::NotFound(csv_path.to_path_buf()));
    }

    let file = File::open(csv_path).map_err(StorageError::wrap("read import file"))?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let header = reader
        .headers()
        .map_err(StorageError::wrap("read import file"))?
        .clone();
    let columns = Columns::from_header(&header)?;

    db.initialize()?;

    let mut inserted = Vec::new();
    let mut skipped = Vec::new();
    let mut rejected = 0;
    let mut failed = 0;

    for (index, record) in reader.records().enumerate() {
        // header is line 1
        let line = index + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Line {line}: unreadable row: {e}");
                rejected += 1;
                continue;
            }
        };

        let row = match parse_row(&columns, &record) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Line {line}: invalid row skipped: {e}");
                rejected += 1;
                continue;
            }
        };

        match store_row(db, &row) {
            Ok(Stored::Inserted(r)) => inserted.push(r),
            Ok(Stored::Duplicate(s)) => {
                tracing::info!(
                    "Line {line}: already present as id={} (nota_final={:?}), skipped",
                    s.existing_id,
                    s.existing_final_score
                );
                skipped.push(s);
            }
            Err(e) => {
                tracing::warn!("Line {line}: {e}");
                failed += 1;
            }
        }
    }

    tracing::info!(
        "Imported {} rows from {} ({} duplicates, {} invalid, {} failed)",
        inserted.len(),
        csv_path.display(),
        skipped.len(),
        rejected,
        failed
    );

    let summary = ImportSummary::from_rows(&inserted, skipped.len());
    let (report_path, summary_path) = report_paths(csv_path);
    write_report(&report_path, &inserted)?;
    write_summary(&summary_path, &summary)?;

    Ok(ImportOutcome {
        inserted,
        skipped,
        rejected,
        failed,
        summary,
        report_path,
        summary_path,
    })
}

enum Stored {
    Inserted(InsertedRow),
    Duplicate(SkippedRow),
}

fn store_row(db: &Database, row: &ImportRow) -> Result<Stored, StorageError> {
    if let Some((existing_id, existing_final_score)) = db.find_by_natural_key(&row.key)? {
        return Ok(Stored::Duplicate(SkippedRow {
            existing_id,
            key: row.key.clone(),
            existing_final_score,
        }));
    }

    let id = db.insert(&row.to_new_evaluation())?;
    let created_at = db
        .get(id)?
        .and_then(|r| r.created_at)
        .unwrap_or_default();

    Ok(Stored::Inserted(InsertedRow {
        id,
        curso: row.key.course.clone(),
        evaluacion: row.key.evaluation.clone(),
        fecha: row.key.date.clone(),
        grupo_o_estudiante: row.key.subject.clone(),
        nota_final: row.final_score,
        created_at,
    }))
}

/// `insert_report_<ts>.csv` and `insert_report_<ts>_summary.csv` beside the input.
fn report_paths(csv_path: &Path) -> (PathBuf, PathBuf) {
    let dir = match csv_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("data"),
    };
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    (
        dir.join(format!("insert_report_{ts}.csv")),
        dir.join(format!("insert_report_{ts}_summary.csv")),
    )
}

const REPORT_HEADER: [&str; 7] = [
    "id",
    "curso",
    "evaluacion",
    "fecha",
    "grupo_o_estudiante",
    "nota_final",
    "created_at",
];

fn write_report(path: &Path, rows: &[InsertedRow]) -> Result<(), StorageError> {
    crate::export::ensure_parent(path, "write import report")?;
    let mut writer = csv::Writer::from_path(path).map_err(StorageError::wrap("write import report"))?;
    if rows.is_empty() {
        writer
            .write_record(REPORT_HEADER)
            .map_err(StorageError::wrap("write import report"))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .map_err(StorageError::wrap("write import report"))?;
    }
    writer.flush().map_err(StorageError::wrap("write import report"))?;
    Ok(())
}

fn write_summary(path: &Path, summary: &ImportSummary) -> Result<(), StorageError> {
    let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    let rows = [
        ("inserted_count", summary.inserted_count.to_string()),
        ("skipped_count", summary.skipped_count.to_string()),
        ("nota_avg", fmt(summary.average)),
        ("nota_min", fmt(summary.min)),
        ("nota_max", fmt(summary.max)),
    ];

    let mut writer = csv::Writer::from_path(path).map_err(StorageError::wrap("write import summary"))?;
    writer
        .write_record(["metric", "value"])
        .map_err(StorageError::wrap("write import summary"))?;
    for (metric, value) in rows {
        writer
            .write_record([metric, value.as_str()])
            .map_err(StorageError::wrap("write import summary"))?;
    }
    writer.flush().map_err(StorageError::wrap("write import summary"))?;
    Ok(())
}
