use std::path::{Path, PathBuf};

use crate::config::{Config, StorageMode};
use crate::db::Database;
use crate::error::StorageError;
use crate::ledger::CsvLedger;
use crate::records::{DetailFilter, Evaluation, NewEvaluation, SortOrder, Summary};

/// Operations shared by the SQLite store and the flat CSV ledger.
pub trait RecordStore {
    fn initialize(&self) -> Result<(), StorageError>;
    fn insert(&self, new: &NewEvaluation) -> Result<i64, StorageError>;
    fn list_summary(&self, order: SortOrder) -> Result<Vec<Summary>, StorageError>;
    fn list_detail(&self, filter: &DetailFilter) -> Result<Vec<Evaluation>, StorageError>;
    fn get(&self, id: i64) -> Result<Option<Evaluation>, StorageError>;
    fn export_all(&self, dest: Option<&Path>) -> Result<PathBuf, StorageError>;
    fn backup_timestamped(&self, dest_dir: Option<&Path>) -> Result<PathBuf, StorageError>;
}

impl RecordStore for Database {
    fn initialize(&self) -> Result<(), StorageError> {
        Database::initialize(self)
    }

    fn insert(&self, new: &NewEvaluation) -> Result<i64, StorageError> {
        Database::insert(self, new)
    }

    fn list_summary(&self, order: SortOrder) -> Result<Vec<Summary>, StorageError> {
        Database::list_summary(self, order)
    }

    fn list_detail(&self, filter: &DetailFilter) -> Result<Vec<Evaluation>, StorageError> {
        Database::list_detail(self, filter)
    }

    fn get(&self, id: i64) -> Result<Option<Evaluation>, StorageError> {
        Database::get(self, id)
    }

    fn export_all(&self, dest: Option<&Path>) -> Result<PathBuf, StorageError> {
        Database::export_all(self, dest)
    }

    fn backup_timestamped(&self, dest_dir: Option<&Path>) -> Result<PathBuf, StorageError> {
        Database::backup_timestamped(self, dest_dir)
    }
}

impl RecordStore for CsvLedger {
    fn initialize(&self) -> Result<(), StorageError> {
        CsvLedger::initialize(self)
    }

    fn insert(&self, new: &NewEvaluation) -> Result<i64, StorageError> {
        CsvLedger::insert(self, new)
    }

    fn list_summary(&self, order: SortOrder) -> Result<Vec<Summary>, StorageError> {
        CsvLedger::list_summary(self, order)
    }

    fn list_detail(&self, filter: &DetailFilter) -> Result<Vec<Evaluation>, StorageError> {
        CsvLedger::list_detail(self, filter)
    }

    fn get(&self, id: i64) -> Result<Option<Evaluation>, StorageError> {
        CsvLedger::get(self, id)
    }

    fn export_all(&self, dest: Option<&Path>) -> Result<PathBuf, StorageError> {
        CsvLedger::export_all(self, dest)
    }

    fn backup_timestamped(&self, dest_dir: Option<&Path>) -> Result<PathBuf, StorageError> {
        CsvLedger::backup_timestamped(self, dest_dir)
    }
}

/// The SQLite store described by `config`.
pub fn database(config: &Config) -> Database {
    Database::new(
        &config.database.path,
        config.database.busy_timeout(),
        config.export.data_dir(),
    )
}

/// The store selected by `mode`, initialized and ready.
pub fn open(config: &Config, mode: StorageMode) -> Result<Box<dyn RecordStore>, StorageError> {
    let store: Box<dyn RecordStore> = match mode {
        StorageMode::Sqlite => Box::new(database(config)),
        StorageMode::Csv => Box::new(CsvLedger::new(&config.storage.csv_path, config.export.data_dir())),
    };
    store.initialize()?;
    tracing::debug!("Opened {mode:?} store");
    Ok(store)
}
