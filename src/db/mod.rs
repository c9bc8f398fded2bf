pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, ToSql};

use crate::error::StorageError;
use crate::export;
use crate::records::{DetailFilter, Evaluation, NaturalKey, NewEvaluation, SortOrder, Summary};

const SELECT_ALL_COLUMNS: &str = "SELECT id, plantilla, curso, evaluacion, fecha, grupo_o_estudiante,
        estructura, programacion, teoria, ia, reflexion, presentacion,
        nota_final, observaciones, created_at
     FROM evaluaciones";

/// SQLite-backed evaluation store.
///
/// Holds only the file location; every operation opens its own connection and
/// drops it before returning.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
    data_dir: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
            data_dir: data_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        export::ensure_parent(&self.path, "open database")?;
        let conn = Connection::open(&self.path).map_err(StorageError::wrap("open database"))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(StorageError::wrap("open database"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(StorageError::wrap("open database"))?;
        Ok(conn)
    }

    /// Create the `evaluaciones` table if it does not exist.
    pub fn initialize(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;
        schema::migrate(&conn).map_err(StorageError::wrap("initialize"))?;
        tracing::debug!("Database ready at {}", self.path.display());
        Ok(())
    }

    /// Insert the supplied columns and return the new id.
    pub fn insert(&self, new: &NewEvaluation) -> Result<i64, StorageError> {
        let columns = bound_columns(new);
        if columns.is_empty() {
            return Err(StorageError::new("insert", "no recognized columns supplied"));
        }

        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO evaluaciones ({}) VALUES ({placeholders})",
            names.join(", ")
        );
        let values: Vec<&dyn ToSql> = columns.iter().map(|(_, value)| *value).collect();

        let conn = self.connect()?;
        conn.execute(&sql, values.as_slice())
            .map_err(StorageError::wrap("insert"))?;
        let id = conn.last_insert_rowid();
        tracing::debug!("Inserted evaluation id={id}");
        Ok(id)
    }

    /// `{id, fecha, grupo_o_estudiante, nota_final}` ordered by date.
    pub fn list_summary(&self, order: SortOrder) -> Result<Vec<Summary>, StorageError> {
        let dir = order.as_sql();
        let sql = format!(
            "SELECT id, fecha, grupo_o_estudiante, nota_final FROM evaluaciones
             ORDER BY fecha {dir}, id {dir}"
        );
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql).map_err(StorageError::wrap("list summary"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Summary {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    subject: row.get(2)?,
                    final_score: row.get(3)?,
                })
            })
            .map_err(StorageError::wrap("list summary"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::wrap("list summary"))
    }

    /// Full records filtered by exact date (in SQL) and text (case-insensitive).
    pub fn list_detail(&self, filter: &DetailFilter) -> Result<Vec<Evaluation>, StorageError> {
        let dir = filter.order.as_sql();
        let conn = self.connect()?;
        let records = match filter.date() {
            Some(date) => {
                let sql = format!("{SELECT_ALL_COLUMNS} WHERE fecha = ?1 ORDER BY fecha {dir}, id {dir}");
                query_records(&conn, &sql, [date], "list detail")?
            }
            None => {
                let sql = format!("{SELECT_ALL_COLUMNS} ORDER BY fecha {dir}, id {dir}");
                query_records(&conn, &sql, [], "list detail")?
            }
        };
        Ok(records
            .into_iter()
            .filter(|r| filter.matches_text(r))
            .collect())
    }

    /// A single record by id.
    pub fn get(&self, id: i64) -> Result<Option<Evaluation>, StorageError> {
        let conn = self.connect()?;
        let sql = format!("{SELECT_ALL_COLUMNS} WHERE id = ?1");
        conn.query_row(&sql, [id], row_to_evaluation)
            .optional()
            .map_err(StorageError::wrap("get"))
    }

    /// `(id, nota_final)` of the first record with this natural key.
    pub fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<(i64, Option<f64>)>, StorageError> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, nota_final FROM evaluaciones
             WHERE curso = ?1 AND evaluacion = ?2 AND fecha = ?3 AND grupo_o_estudiante = ?4
             ORDER BY id LIMIT 1",
            rusqlite::params![key.course, key.evaluation, key.date, key.subject],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(StorageError::wrap("find by natural key"))
    }

    /// Every record, newest date first.
    pub fn all_records(&self) -> Result<Vec<Evaluation>, StorageError> {
        let conn = self.connect()?;
        let sql = format!("{SELECT_ALL_COLUMNS} ORDER BY fecha DESC, id DESC");
        query_records(&conn, &sql, [], "read all")
    }

    /// Dump every record to `dest` (default `<data_dir>/evaluaciones_export.csv`).
    pub fn export_all(&self, dest: Option<&Path>) -> Result<PathBuf, StorageError> {
        let records = self.all_records()?;
        let path = match dest {
            Some(p) => p.to_path_buf(),
            None => self.data_dir.join(export::EXPORT_FILE_NAME),
        };
        export::write_export(&path, &records)
    }

    /// Dump every record to `<dir>/backup_YYYYMMDD_HHMMSS.csv`.
    pub fn backup_timestamped(&self, dest_dir: Option<&Path>) -> Result<PathBuf, StorageError> {
        let records = self.all_records()?;
        export::write_backup(dest_dir.unwrap_or(&self.data_dir), &records)
    }

    /// Total number of stored evaluations.
    pub fn count(&self) -> Result<usize, StorageError> {
        let conn = self.connect()?;
        conn.query_row("SELECT COUNT(*) FROM evaluaciones", [], |row| {
            row.get::<_, i64>(0).map(|c| c as usize)
        })
        .map_err(StorageError::wrap("count"))
    }
}

/// Present columns of `new`, in table order, with their bound values.
fn bound_columns(new: &NewEvaluation) -> Vec<(&'static str, &dyn ToSql)> {
    let mut columns: Vec<(&'static str, &dyn ToSql)> = Vec::new();
    push_text(&mut columns, "plantilla", &new.template);
    push_text(&mut columns, "curso", &new.course);
    push_text(&mut columns, "evaluacion", &new.evaluation);
    push_text(&mut columns, "fecha", &new.date);
    push_text(&mut columns, "grupo_o_estudiante", &new.subject);
    push_real(&mut columns, "estructura", &new.structure);
    push_real(&mut columns, "programacion", &new.programming);
    push_real(&mut columns, "teoria", &new.theory);
    push_real(&mut columns, "ia", &new.ai_usage);
    push_real(&mut columns, "reflexion", &new.reflection);
    push_real(&mut columns, "presentacion", &new.presentation);
    push_real(&mut columns, "nota_final", &new.final_score);
    push_text(&mut columns, "observaciones", &new.observations);
    columns
}

fn push_text<'a>(columns: &mut Vec<(&'static str, &'a dyn ToSql)>, name: &'static str, value: &'a Option<String>) {
    if let Some(v) = value {
        columns.push((name, v));
    }
}

fn push_real<'a>(columns: &mut Vec<(&'static str, &'a dyn ToSql)>, name: &'static str, value: &'a Option<f64>) {
    if let Some(v) = value {
        columns.push((name, v));
    }
}

fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    operation: &'static str,
) -> Result<Vec<Evaluation>, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(StorageError::wrap(operation))?;
    let rows = stmt
        .query_map(params, row_to_evaluation)
        .map_err(StorageError::wrap(operation))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StorageError::wrap(operation))
}

fn row_to_evaluation(row: &rusqlite::Row) -> rusqlite::Result<Evaluation> {
    Ok(Evaluation {
        id: row.get(0)?,
        template: row.get(1)?,
        course: row.get(2)?,
        evaluation: row.get(3)?,
        date: row.get(4)?,
        subject: row.get(5)?,
        structure: row.get(6)?,
        programming: row.get(7)?,
        theory: row.get(8)?,
        ai_usage: row.get(9)?,
        reflection: row.get(10)?,
        presentation: row.get(11)?,
        final_score: row.get(12)?,
        observations: row.get(13)?,
        created_at: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(
            dir.path().join("rubrica.db"),
            Duration::from_secs(5),
            dir.path().join("data"),
        );
        db.initialize().unwrap();
        (dir, db)
    }

    fn evaluation(subject: &str, date: &str, observations: &str) -> NewEvaluation {
        NewEvaluation {
            template: Some("Agroindustrial".into()),
            course: Some("Inteligencia Artificial".into()),
            evaluation: Some("Tarea 2".into()),
            date: Some(date.into()),
            subject: Some(subject.into()),
            structure: Some(3.5),
            programming: Some(3.8),
            theory: Some(4.2),
            ai_usage: Some(4.5),
            reflection: Some(3.9),
            presentation: Some(4.0),
            final_score: Some(3.98),
            observations: Some(observations.into()),
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let (_dir, db) = open_temp_db();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn wal_mode_is_enabled() {
        let (_dir, db) = open_temp_db();
        let conn = db.connect().unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0)).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
        // NORMAL = 1
        let sync: i64 = conn.query_row("PRAGMA synchronous", [], |r| r.get(0)).unwrap();
        assert_eq!(sync, 1);
    }

    #[test]
    fn insert_and_read_back() {
        let (_dir, db) = open_temp_db();
        let new = evaluation("Grupo B", "2025-10-12", "Necesita mejorar la implementación");
        let id = db.insert(&new).unwrap();
        assert!(id > 0);

        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.template, new.template);
        assert_eq!(stored.course, new.course);
        assert_eq!(stored.evaluation, new.evaluation);
        assert_eq!(stored.date, new.date);
        assert_eq!(stored.subject, new.subject);
        assert_eq!(stored.scores(), new.scores());
        assert_eq!(stored.final_score, new.final_score);
        assert_eq!(stored.observations, new.observations);
        assert!(stored.created_at.is_some());
    }

    #[test]
    fn partial_insert_leaves_other_columns_null() {
        let (_dir, db) = open_temp_db();
        let id = db
            .insert(&NewEvaluation {
                subject: Some("Grupo C".into()),
                final_score: Some(0.0),
                ..Default::default()
            })
            .unwrap();
        let stored = db.get(id).unwrap().unwrap();
        assert_eq!(stored.subject.as_deref(), Some("Grupo C"));
        assert_eq!(stored.final_score, Some(0.0));
        assert_eq!(stored.course, None);
        assert_eq!(stored.structure, None);
        assert_eq!(stored.observations, None);
    }

    #[test]
    fn insert_without_columns_fails() {
        let (_dir, db) = open_temp_db();
        let err = db.insert(&NewEvaluation::default()).unwrap_err();
        assert_eq!(err.operation, "insert");
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn ids_are_monotonic() {
        let (_dir, db) = open_temp_db();
        let a = db.insert(&evaluation("A", "2025-01-01", "")).unwrap();
        let b = db.insert(&evaluation("A", "2025-01-01", "")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn get_missing_is_none() {
        let (_dir, db) = open_temp_db();
        assert!(db.get(42).unwrap().is_none());
    }

    #[test]
    fn summary_orders_by_date() {
        let (_dir, db) = open_temp_db();
        for date in ["2025-01-01", "2025-06-01", "2025-03-01"] {
            db.insert(&evaluation("Grupo A", date, "")).unwrap();
        }

        let asc: Vec<_> = db
            .list_summary(SortOrder::Asc)
            .unwrap()
            .into_iter()
            .map(|s| s.date.unwrap())
            .collect();
        assert_eq!(asc, vec!["2025-01-01", "2025-03-01", "2025-06-01"]);

        let desc: Vec<_> = db
            .list_summary(SortOrder::Desc)
            .unwrap()
            .into_iter()
            .map(|s| s.date.unwrap())
            .collect();
        assert_eq!(desc, vec!["2025-06-01", "2025-03-01", "2025-01-01"]);
    }

    #[test]
    fn detail_text_filter() {
        let (_dir, db) = open_temp_db();
        db.insert(&evaluation("Grupo B", "2025-10-12", "Necesita mejorar")).unwrap();
        db.insert(&evaluation("Grupo C", "2025-10-13", "Excelente")).unwrap();

        let hit = db
            .list_detail(&DetailFilter {
                text: Some("MEJORAR".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].subject.as_deref(), Some("Grupo B"));

        let miss = db
            .list_detail(&DetailFilter {
                text: Some("inexistente".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn detail_date_and_text_combine() {
        let (_dir, db) = open_temp_db();
        db.insert(&evaluation("Grupo B", "2025-10-12", "Necesita mejorar")).unwrap();
        db.insert(&evaluation("Grupo C", "2025-10-12", "Excelente")).unwrap();
        db.insert(&evaluation("Grupo D", "2025-10-13", "Necesita mejorar")).unwrap();

        let by_date = db
            .list_detail(&DetailFilter {
                date: Some("2025-10-12".into()),
                order: SortOrder::Asc,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_date.len(), 2);

        let both = db
            .list_detail(&DetailFilter {
                text: Some("mejorar".into()),
                date: Some("2025-10-12".into()),
                order: SortOrder::Asc,
            })
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].subject.as_deref(), Some("Grupo B"));
    }

    #[test]
    fn natural_key_lookup() {
        let (_dir, db) = open_temp_db();
        let new = evaluation("Grupo B", "2025-10-12", "");
        let id = db.insert(&new).unwrap();
        db.insert(&new).unwrap();

        let key = db.get(id).unwrap().unwrap().natural_key();
        assert_eq!(key.course, "Inteligencia Artificial");
        assert_eq!(key.date, "2025-10-12");
        assert_eq!(db.find_by_natural_key(&key).unwrap(), Some((id, Some(3.98))));

        let other = NaturalKey {
            subject: "Grupo Z".into(),
            ..key
        };
        assert_eq!(db.find_by_natural_key(&other).unwrap(), None);
    }

    #[test]
    fn export_flattens_multiline_observations() {
        let (dir, db) = open_temp_db();
        db.insert(&evaluation("Grupo A", "2025-01-01", "línea uno\n\nlínea dos\n")).unwrap();
        db.insert(&evaluation("Grupo B", "2025-02-01", "simple")).unwrap();

        let path = db.export_all(None).unwrap();
        assert_eq!(path, dir.path().join("data").join(export::EXPORT_FILE_NAME));

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
        let mut reader = csv::Reader::from_reader(&bytes[3..]);
        let headers = reader.headers().unwrap().clone();
        let obs = headers.iter().position(|h| h == "observaciones").unwrap();
        let subject = headers.iter().position(|h| h == "grupo_o_estudiante").unwrap();
        let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();

        // newest first
        assert_eq!(&rows[0][subject], "Grupo B");
        assert_eq!(&rows[1][obs], "línea uno | línea dos");
        assert!(rows.iter().all(|r| !r[obs].contains('\n')));
    }

    #[test]
    fn export_to_explicit_path() {
        let (dir, db) = open_temp_db();
        db.insert(&evaluation("Grupo A", "2025-01-01", "")).unwrap();
        let dest = dir.path().join("out/custom.csv");
        assert_eq!(db.export_all(Some(&dest)).unwrap(), dest);
        assert!(dest.exists());
    }

    #[test]
    fn backup_writes_into_directory() {
        let (dir, db) = open_temp_db();
        db.insert(&evaluation("Grupo A", "2025-01-01", "")).unwrap();
        let backups = dir.path().join("backups");
        let path = db.backup_timestamped(Some(&backups)).unwrap();
        assert_eq!(path.parent().unwrap(), backups);
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("backup_"));
    }

    #[test]
    fn unreachable_path_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a dir").unwrap();
        let db = Database::new(blocker.join("rubrica.db"), Duration::from_secs(1), dir.path());
        let err = db.initialize().unwrap_err();
        assert_eq!(err.operation, "open database");
    }
}
