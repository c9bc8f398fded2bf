use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::error::StorageError;
use crate::records::Evaluation;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Separator used when flattening multi-line observations.
pub const LINE_JOINER: &str = " | ";

pub const EXPORT_FILE_NAME: &str = "evaluaciones_export.csv";

/// Line and paragraph separators that end a line of observations.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}'..='\u{1e}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Join the trimmed, non-empty lines of `text` so it fits on one CSV line.
pub fn flatten_observations(text: &str) -> String {
    text.split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(LINE_JOINER)
}

/// `backup_YYYYMMDD_HHMMSS.csv` for the current local time.
pub fn backup_file_name() -> String {
    format!("backup_{}.csv", Local::now().format("%Y%m%d_%H%M%S"))
}

#[derive(Serialize)]
struct ExportRow<'a> {
    id: i64,
    plantilla: Option<&'a str>,
    curso: Option<&'a str>,
    evaluacion: Option<&'a str>,
    fecha: Option<&'a str>,
    grupo_o_estudiante: Option<&'a str>,
    estructura: Option<f64>,
    programacion: Option<f64>,
    teoria: Option<f64>,
    ia: Option<f64>,
    reflexion: Option<f64>,
    presentacion: Option<f64>,
    nota_final: Option<f64>,
    observaciones: String,
    created_at: Option<&'a str>,
    observaciones_raw: &'a str,
}

impl<'a> From<&'a Evaluation> for ExportRow<'a> {
    fn from(r: &'a Evaluation) -> Self {
        let raw = r.observations.as_deref().unwrap_or_default();
        Self {
            id: r.id,
            plantilla: r.template.as_deref(),
            curso: r.course.as_deref(),
            evaluacion: r.evaluation.as_deref(),
            fecha: r.date.as_deref(),
            grupo_o_estudiante: r.subject.as_deref(),
            estructura: r.structure,
            programacion: r.programming,
            teoria: r.theory,
            ia: r.ai_usage,
            reflexion: r.reflection,
            presentacion: r.presentation,
            nota_final: r.final_score,
            observaciones: flatten_observations(raw),
            created_at: r.created_at.as_deref(),
            observaciones_raw: raw,
        }
    }
}

/// Write `records` (already ordered) to `path`, overwriting it.
pub fn write_export(path: &Path, records: &[Evaluation]) -> Result<PathBuf, StorageError> {
    ensure_parent(path, "export")?;
    let file = File::create(path).map_err(StorageError::wrap("export"))?;
    write_records(file, records, "export")?;
    tracing::info!("Exported {} evaluations to {}", records.len(), path.display());
    Ok(path.to_path_buf())
}

/// Write `records` to a new timestamped file in `dir`. Never overwrites.
pub fn write_backup(dir: &Path, records: &[Evaluation]) -> Result<PathBuf, StorageError> {
    write_backup_named(dir, &backup_file_name(), records)
}

fn write_backup_named(dir: &Path, name: &str, records: &[Evaluation]) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir).map_err(StorageError::wrap("backup"))?;
    let path = dir.join(name);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| StorageError::new("backup", format!("{}: {e}", path.display())))?;
    write_records(file, records, "backup")?;
    tracing::info!("Backup of {} evaluations written to {}", records.len(), path.display());
    Ok(path)
}

fn write_records(mut file: File, records: &[Evaluation], operation: &'static str) -> Result<(), StorageError> {
    file.write_all(UTF8_BOM).map_err(StorageError::wrap(operation))?;
    let mut writer = csv::Writer::from_writer(file);
    if records.is_empty() {
        writer
            .write_record(EXPORT_HEADER)
            .map_err(StorageError::wrap(operation))?;
    }
    for record in records {
        writer
            .serialize(ExportRow::from(record))
            .map_err(StorageError::wrap(operation))?;
    }
    writer.flush().map_err(StorageError::wrap(operation))?;
    Ok(())
}

/// Header written by serde for [`ExportRow`]; spelled out for empty exports.
pub const EXPORT_HEADER: [&str; 16] = [
    "id",
    "plantilla",
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
    "nota_final",
    "observaciones",
    "created_at",
    "observaciones_raw",
];

pub(crate) fn ensure_parent(path: &Path, operation: &'static str) -> Result<(), StorageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(StorageError::wrap(operation))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, observations: Option<&str>) -> Evaluation {
        Evaluation {
            id,
            template: Some("Civil".into()),
            course: Some("Física".into()),
            evaluation: Some("Examen Final".into()),
            date: Some("2025-06-20".into()),
            subject: Some("Estudiante 07".into()),
            structure: Some(4.0),
            programming: None,
            theory: Some(4.8),
            ai_usage: None,
            reflection: Some(4.4),
            presentation: Some(4.1),
            final_score: Some(4.3),
            observations: observations.map(String::from),
            created_at: Some("2025-06-20 10:00:00".into()),
        }
    }

    fn read_rows(path: &Path) -> (Vec<u8>, csv::StringRecord, Vec<csv::StringRecord>) {
        let bytes = fs::read(path).unwrap();
        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        let headers = reader.headers().unwrap().clone();
        let rows = reader.records().map(|r| r.unwrap()).collect();
        (bytes, headers, rows)
    }

    #[test]
    fn flatten_joins_non_empty_lines() {
        assert_eq!(flatten_observations("  uno \n\n dos\r\ntres  "), "uno | dos | tres");
        assert_eq!(flatten_observations(""), "");
        assert_eq!(flatten_observations("una sola"), "una sola");
    }

    #[test]
    fn flatten_splits_on_every_line_break() {
        assert_eq!(flatten_observations("uno\rdos\u{2028}tres"), "uno | dos | tres");
        assert_eq!(
            flatten_observations("a\u{0b}b\u{0c}c\u{1c}d\u{1d}e\u{1e}f\u{85}g\u{2029}h"),
            "a | b | c | d | e | f | g | h"
        );
        assert!(!flatten_observations("x\r\r\ny\u{2028}").contains(is_line_break));
    }

    #[test]
    fn export_has_bom_flat_and_raw_observations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let records = vec![record(1, Some("Muy bien\nrevisar\n\nconclusión")), record(2, None)];

        let written = write_export(&path, &records).unwrap();
        assert_eq!(written, path);

        let (bytes, headers, rows) = read_rows(&path);
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(headers.iter().collect::<Vec<_>>(), EXPORT_HEADER.to_vec());
        assert_eq!(rows.len(), 2);

        let obs = headers.iter().position(|h| h == "observaciones").unwrap();
        let raw = headers.iter().position(|h| h == "observaciones_raw").unwrap();
        assert_eq!(&rows[0][obs], "Muy bien | revisar | conclusión");
        assert!(!rows[0][obs].contains('\n'));
        assert_eq!(&rows[0][raw], "Muy bien\nrevisar\n\nconclusión");
        assert_eq!(&rows[1][obs], "");
        assert_eq!(&rows[1][raw], "");

        let prog = headers.iter().position(|h| h == "programacion").unwrap();
        assert_eq!(&rows[0][prog], "");
    }

    #[test]
    fn empty_export_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_export(&path, &[]).unwrap();
        let (_, headers, rows) = read_rows(&path);
        assert_eq!(headers.len(), EXPORT_HEADER.len());
        assert!(rows.is_empty());
    }

    #[test]
    fn backup_uses_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_backup(dir.path(), &[record(1, Some("x"))]).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("backup_"));
        assert!(name.ends_with(".csv"));
        // backup_ + YYYYMMDD_HHMMSS + .csv
        assert_eq!(name.len(), "backup_".len() + 15 + ".csv".len());
        let (_, _, rows) = read_rows(&path);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn backup_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let name = "backup_20250101_120000.csv";
        fs::write(dir.path().join(name), "keep").unwrap();

        let err = write_backup_named(dir.path(), name, &[record(1, None)]).unwrap_err();
        assert_eq!(err.operation, "backup");
        assert_eq!(fs::read_to_string(dir.path().join(name)).unwrap(), "keep");
    }
}
