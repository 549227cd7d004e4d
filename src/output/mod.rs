//! Output module for run reports and dataset statistics
//!
//! This module handles:
//! - The per-run report (pages fetched, rows skipped, pages lost)
//! - Summary statistics over the stored dataset

mod report;
mod stats;

pub use report::{format_report, print_report, CrawlReport, LostPage, RowIssue};
pub use stats::{load_statistics, print_statistics, DatasetStatistics};
