//! Storage traits and error types
//!
//! The crawl core talks to persisted output through two narrow roles:
//! a [`RecordSink`] that receives records as they are parsed, and a
//! [`PriorOutput`] that the range planner reads before the run starts.

use crate::output::CrawlReport;
use crate::record::Record;
use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt stored data at {location}: {message}")]
    Corrupt { location: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Consumer of the records emitted by a crawl
///
/// Records arrive in per-page row order, once each; the crawl does not
/// suppress duplicates across runs, so implementations decide how to merge.
pub trait RecordSink {
    /// Accepts one record
    fn accept(&mut self, record: &Record) -> StorageResult<()>;

    /// Makes every accepted record durable
    ///
    /// # Arguments
    ///
    /// * `report` - Outcome of the run that produced the records
    fn finish(&mut self, report: &CrawlReport) -> StorageResult<()>;
}

/// Read-only view of previously persisted output
pub trait PriorOutput {
    /// Timestamp of the newest stored event, or `None` if nothing is stored
    fn latest_timestamp(&self) -> StorageResult<Option<NaiveDateTime>>;

    /// Every stored event, ordered by timestamp
    fn load_all(&self) -> StorageResult<Vec<Record>>;
}

/// A persisted dataset playing both collaborator roles
pub trait EventStore: RecordSink + PriorOutput {}

impl<T: RecordSink + PriorOutput> EventStore for T {}
