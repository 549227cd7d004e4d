//! CSV output
//!
//! The CSV file holds every event collected so far. Records accepted during a
//! run are buffered and merged into the file on [`RecordSink::finish`]:
//! duplicates are resolved by `id` (the newer copy wins, since consecutive
//! windows overlap by one day) and the result is sorted by timestamp.

use crate::config::PackageConfig;
use crate::output::CrawlReport;
use crate::record::{RawRecord, Record, FIELDS};
use crate::storage::datapackage::write_manifest;
use crate::storage::traits::{PriorOutput, RecordSink, StorageError, StorageResult};
use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// CSV-file event store
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    package: Option<PackageConfig>,
    pending: Vec<Record>,
}

impl CsvStore {
    /// Creates a store backed by `path`; the file is created on first finish
    pub fn new(path: PathBuf, package: Option<PackageConfig>) -> Self {
        Self {
            path,
            package,
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records accepted but not yet written
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Reads every stored record
    ///
    /// A missing or empty file yields no records. A line that does not
    /// validate makes the whole file [`StorageError::Corrupt`].
    fn read_existing(&self) -> StorageResult<Vec<Record>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        for required in ["id", "timestamp"] {
            if !headers.iter().any(|h| h == required) {
                return Err(StorageError::Corrupt {
                    location: self.path.display().to_string(),
                    message: format!("missing column '{}'", required),
                });
            }
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result?;
            let raw = RawRecord::from_columns(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .and_then(|i| row.get(i))
                    .map(str::to_string)
            });

            let record = Record::from_stored(raw).map_err(|e| StorageError::Corrupt {
                location: format!(
                    "{}:{}",
                    self.path.display(),
                    row.position().map(|p| p.line()).unwrap_or(0)
                ),
                message: e.to_string(),
            })?;
            records.push(record);
        }

        Ok(records)
    }

    /// Reads the stored records for a merge
    ///
    /// A file that cannot be read back is renamed to
    /// `<name>.corrupt-<YYYYmmddHHMMSS>` and treated as empty, so the records
    /// of the current run are still written.
    fn existing_for_merge(&self) -> StorageResult<Vec<Record>> {
        match self.read_existing() {
            Ok(records) => Ok(records),
            Err(e @ StorageError::Corrupt { .. }) => self.set_aside(&e),
            Err(StorageError::Csv(e)) if !e.is_io_error() => {
                self.set_aside(&StorageError::Csv(e))
            }
            Err(e) => Err(e),
        }
    }

    fn set_aside(&self, cause: &StorageError) -> StorageResult<Vec<Record>> {
        let aside = corrupt_path(&self.path, Local::now().naive_local());
        std::fs::rename(&self.path, &aside)?;
        tracing::warn!(
            "Existing output is unreadable ({}); moved it to {} and starting a new file",
            cause,
            aside.display()
        );
        Ok(Vec::new())
    }

    /// Rewrites the file with `records`, through a temporary sibling file
    fn write_all(&self, records: &[Record]) -> StorageResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            writer.write_record(FIELDS.iter().map(|f| f.name))?;
            for record in records {
                writer.write_record(&record.to_columns())?;
            }
            writer.flush()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl RecordSink for CsvStore {
    fn accept(&mut self, record: &Record) -> StorageResult<()> {
        self.pending.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, report: &CrawlReport) -> StorageResult<()> {
        let existing = self.existing_for_merge()?;
        let previous = existing.len();

        let merged = merge_records(existing, std::mem::take(&mut self.pending));
        self.write_all(&merged)?;

        tracing::info!(
            "Wrote {} events to {} ({} emitted this run, {} previously stored)",
            merged.len(),
            self.path.display(),
            report.records,
            previous
        );

        if let Some(package) = &self.package {
            write_manifest(package, &self.path)?;
        }

        Ok(())
    }
}

impl PriorOutput for CsvStore {
    fn latest_timestamp(&self) -> StorageResult<Option<NaiveDateTime>> {
        Ok(self.read_existing()?.iter().map(Record::timestamp).max())
    }

    fn load_all(&self) -> StorageResult<Vec<Record>> {
        let mut records = self.read_existing()?;
        sort_records(&mut records);
        Ok(records)
    }
}

/// Merges two record sets by id, preferring `newer`, sorted by timestamp
fn merge_records(older: Vec<Record>, newer: Vec<Record>) -> Vec<Record> {
    let mut by_id: HashMap<i64, Record> = HashMap::with_capacity(older.len() + newer.len());
    for record in older.into_iter().chain(newer) {
        by_id.insert(record.id(), record);
    }

    let mut merged: Vec<Record> = by_id.into_values().collect();
    sort_records(&mut merged);
    merged
}

/// Sibling path a corrupt output file is moved to
fn corrupt_path(path: &Path, at: NaiveDateTime) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", at.format("%Y%m%d%H%M%S")));
    PathBuf::from(name)
}

fn sort_records(records: &mut [Record]) {
    records.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| a.id().cmp(&b.id()))
    });
}
