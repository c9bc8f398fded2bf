use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::export;
use crate::records::{DetailFilter, Evaluation, NewEvaluation, SortOrder, Summary};

pub const LEDGER_FILE_NAME: &str = "evaluaciones_only_csv.csv";

/// Append-only flat CSV store, used instead of SQLite when configured.
///
/// Rows carry no id column; a record's id is its 1-based position in the file.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
    data_dir: PathBuf,
}

/// One line of the ledger file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerRow {
    plantilla: Option<String>,
    curso: Option<String>,
    evaluacion: Option<String>,
    fecha: Option<String>,
    grupo_o_estudiante: Option<String>,
    estructura: Option<f64>,
    programacion: Option<f64>,
    teoria: Option<f64>,
    ia: Option<f64>,
    reflexion: Option<f64>,
    presentacion: Option<f64>,
    nota_final: Option<f64>,
    observaciones: Option<String>,
    created_at: Option<String>,
}

impl LedgerRow {
    fn from_new(new: &NewEvaluation, created_at: String) -> Self {
        Self {
            plantilla: new.template.clone(),
            curso: new.course.clone(),
            evaluacion: new.evaluation.clone(),
            fecha: new.date.clone(),
            grupo_o_estudiante: new.subject.clone(),
            estructura: new.structure,
            programacion: new.programming,
            teoria: new.theory,
            ia: new.ai_usage,
            reflexion: new.reflection,
            presentacion: new.presentation,
            nota_final: new.final_score,
            observaciones: new.observations.clone(),
            created_at: Some(created_at),
        }
    }

    fn into_evaluation(self, id: i64) -> Evaluation {
        Evaluation {
            id,
            template: self.plantilla,
            course: self.curso,
            evaluation: self.evaluacion,
            date: self.fecha,
            subject: self.grupo_o_estudiante,
            structure: self.estructura,
            programming: self.programacion,
            theory: self.teoria,
            ai_usage: self.ia,
            reflection: self.reflexion,
            presentation: self.presentacion,
            final_score: self.nota_final,
            observations: self.observaciones,
            created_at: self.created_at,
        }
    }
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn initialize(&self) -> Result<(), StorageError> {
        export::ensure_parent(&self.path, "initialize")
    }

    /// Append one row, writing the header first if the file is new or empty.
    pub fn insert(&self, new: &NewEvaluation) -> Result<i64, StorageError> {
        if new.is_empty() {
            return Err(StorageError::new("insert", "no recognized columns supplied"));
        }
        export::ensure_parent(&self.path, "insert")?;

        let existing = self.read_rows("insert")?.len();
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(StorageError::wrap("insert"))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        let created_at = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        writer
            .serialize(LedgerRow::from_new(new, created_at))
            .map_err(StorageError::wrap("insert"))?;
        writer.flush().map_err(StorageError::wrap("insert"))?;

        let id = existing as i64 + 1;
        tracing::debug!("Appended evaluation #{id} to {}", self.path.display());
        Ok(id)
    }

    pub fn list_summary(&self, order: SortOrder) -> Result<Vec<Summary>, StorageError> {
        let mut records = self.all_records_in("list summary")?;
        order.sort(&mut records);
        Ok(records.iter().map(Evaluation::summary).collect())
    }

    pub fn list_detail(&self, filter: &DetailFilter) -> Result<Vec<Evaluation>, StorageError> {
        let mut records: Vec<Evaluation> = self
            .all_records_in("list detail")?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        filter.order.sort(&mut records);
        Ok(records)
    }

    pub fn get(&self, id: i64) -> Result<Option<Evaluation>, StorageError> {
        Ok(self
            .all_records_in("get")?
            .into_iter()
            .find(|r| r.id == id))
    }

    /// Every record, newest date first.
    pub fn all_records(&self) -> Result<Vec<Evaluation>, StorageError> {
        let mut records = self.all_records_in("read all")?;
        SortOrder::Desc.sort(&mut records);
        Ok(records)
    }

    pub fn export_all(&self, dest: Option<&Path>) -> Result<PathBuf, StorageError> {
        let records = self.all_records()?;
        let path = match dest {
            Some(p) => p.to_path_buf(),
            None => self.data_dir.join(export::EXPORT_FILE_NAME),
        };
        export::write_export(&path, &records)
    }

    pub fn backup_timestamped(&self, dest_dir: Option<&Path>) -> Result<PathBuf, StorageError> {
        let records = self.all_records()?;
        export::write_backup(dest_dir.unwrap_or(&self.data_dir), &records)
    }

    fn all_records_in(&self, operation: &'static str) -> Result<Vec<Evaluation>, StorageError> {
        Ok(self
            .read_rows(operation)?
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.into_evaluation(i as i64 + 1))
            .collect())
    }

    fn read_rows(&self, operation: &'static str) -> Result<Vec<LedgerRow>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::new(operation, e.to_string())),
        };
        let mut reader = csv::Reader::from_reader(file);
        reader
            .deserialize::<LedgerRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::wrap(operation))
    }
}
