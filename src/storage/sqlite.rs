//! SQLite storage implementation
//!
//! Events are upserted as they arrive, so the database never holds two rows
//! for the same event. Each finished run leaves one row in `runs`.

use crate::output::CrawlReport;
use crate::record::{RawRecord, Record, STORED_TIMESTAMP_FORMAT};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PriorOutput, RecordSink, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite event store
pub struct SqliteStore {
    conn: Connection,
    config_hash: String,
    started_at: String,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config_hash` - Hash of the configuration, recorded with each run
    pub fn new(path: &Path, config_hash: &str) -> StorageResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::with_connection(conn, config_hash))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::with_connection(conn, "test"))
    }

    fn with_connection(conn: Connection, config_hash: &str) -> Self {
        Self {
            conn,
            config_hash: config_hash.to_string(),
            started_at: Utc::now().to_rfc3339(),
        }
    }

    /// Returns the most recently finished run, if any
    pub fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status, date_from, date_to,
             records, row_errors, lost_pages
             FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Partial),
                    date_from: row.get(5)?,
                    date_to: row.get(6)?,
                    records: row.get(7)?,
                    row_errors: row.get(8)?,
                    lost_pages: row.get(9)?,
                })
            })
            .optional()?;

        Ok(run)
    }

    /// Number of stored events
    pub fn count_events(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl RecordSink for SqliteStore {
    fn accept(&mut self, record: &Record) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO events
             (id, timestamp, latitude, longitude, felt, depth_km, magnitude, intensity, province, detail_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id(),
                record.timestamp().format(STORED_TIMESTAMP_FORMAT).to_string(),
                record.latitude(),
                record.longitude(),
                record.felt(),
                record.depth_km(),
                record.magnitude(),
                record.intensity(),
                record.province(),
                record.detail_url().as_str(),
            ],
        )?;
        Ok(())
    }

    fn finish(&mut self, report: &CrawlReport) -> StorageResult<()> {
        let status = if report.is_complete() {
            RunStatus::Completed
        } else {
            RunStatus::Partial
        };

        self.conn.execute(
            "INSERT INTO runs
             (started_at, finished_at, config_hash, status, date_from, date_to, records, row_errors, lost_pages)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.started_at,
                Utc::now().to_rfc3339(),
                self.config_hash,
                status.to_db_string(),
                report.window.form_from(),
                report.window.form_to(),
                report.records as i64,
                report.row_errors.len() as i64,
                report.lost_pages.len() as i64,
            ],
        )?;

        tracing::info!(
            "Recorded run as {} ({} events stored in total)",
            status.to_db_string(),
            self.count_events()?
        );
        Ok(())
    }
}

impl PriorOutput for SqliteStore {
    fn latest_timestamp(&self) -> StorageResult<Option<NaiveDateTime>> {
        let latest: Option<String> =
            self.conn
                .query_row("SELECT MAX(timestamp) FROM events", [], |row| row.get(0))?;

        latest
            .map(|raw| {
                NaiveDateTime::parse_from_str(&raw, STORED_TIMESTAMP_FORMAT).map_err(|e| {
                    StorageError::Corrupt {
                        location: "events.timestamp".to_string(),
                        message: format!("{:?}: {}", raw, e),
                    }
                })
            })
            .transpose()
    }

    fn load_all(&self) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, latitude, longitude, felt, depth_km, magnitude,
             intensity, province, detail_url
             FROM events ORDER BY timestamp, id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(RawRecord {
                id: Some(row.get::<_, i64>(0)?.to_string()),
                timestamp: row.get(1)?,
                latitude: Some(row.get::<_, f64>(2)?.to_string()),
                longitude: Some(row.get::<_, f64>(3)?.to_string()),
                felt: Some(row.get::<_, bool>(4)?.to_string()),
                depth_km: Some(row.get::<_, i64>(5)?.to_string()),
                magnitude: Some(row.get::<_, f64>(6)?.to_string()),
                intensity: row.get(7)?,
                province: row.get(8)?,
                detail_url: row.get(9)?,
            })
        })?;

        let mut records = Vec::new();
        for raw in rows {
            let raw = raw?;
            let location = format!("events#{}", raw.id.as_deref().unwrap_or("?"));
            let record = Record::from_stored(raw).map_err(|e| StorageError::Corrupt {
                location,
                message: e.to_string(),
            })?;
            records.push(record);
        }

        Ok(records)
    }
}
