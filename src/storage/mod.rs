//! Storage module for persisting collected events
//!
//! This module handles:
//! - CSV output, merged and sorted across runs
//! - Data-package manifests describing the CSV output
//! - SQLite output with per-run bookkeeping
//! - Reading back stored events to plan the next run

mod csv_store;
mod datapackage;
mod schema;
mod sqlite;
mod traits;

pub use csv_store::CsvStore;
pub use datapackage::{build_manifest, write_manifest, MANIFEST_FILE_NAME};
pub use sqlite::SqliteStore;
pub use traits::{EventStore, PriorOutput, RecordSink, StorageError, StorageResult};

use crate::config::{OutputConfig, OutputFormat};

/// Opens the store described by the output configuration
///
/// # Arguments
///
/// * `config` - The output section of the configuration
/// * `config_hash` - Hash of the configuration file, recorded with each run
///
/// # Returns
///
/// * `Ok(Box<dyn EventStore>)` - Store ready to be read and written
/// * `Err(StorageError)` - The database could not be opened
pub fn open_store(config: &OutputConfig, config_hash: &str) -> StorageResult<Box<dyn EventStore>> {
    match config.format {
        OutputFormat::Csv => Ok(Box::new(CsvStore::new(
            config.path.clone(),
            config.package.clone(),
        ))),
        OutputFormat::Sqlite => Ok(Box::new(SqliteStore::new(&config.path, config_hash)?)),
    }
}

/// Represents a finished harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub date_from: String,
    pub date_to: String,
    pub records: i64,
    pub row_errors: i64,
    pub lost_pages: i64,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every discovered page was fetched
    Completed,
    /// At least one follow-up page was lost
    Partial,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}
