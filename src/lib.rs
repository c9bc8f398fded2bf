//! Rubric grade entry: weighted scoring, evaluation storage in SQLite or an
//! append-only CSV ledger, CSV export/backup, and bulk CSV import.

pub mod config;
pub mod db;
pub mod draft;
pub mod error;
pub mod export;
pub mod import;
pub mod ledger;
pub mod records;
pub mod scoring;
pub mod seed;
pub mod store;

pub use error::{ImportError, StorageError, ValidationError};
pub use records::{DetailFilter, Evaluation, NewEvaluation, SortOrder, Summary};
pub use store::RecordStore;
