//! Run report
//!
//! A [`CrawlReport`] accumulates what happened during one run: the submitted
//! window, pages fetched and lost, records emitted and rows that failed to
//! parse. It is handed to the sink on finish and printed by the binary.

use crate::crawler::QueryWindow;

/// A row that failed to parse
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    /// Label of the page the row was on (`1` for the first page)
    pub page: String,

    /// Trimmed cell texts of the row
    pub cells: Vec<String>,

    pub reason: String,
}

/// A follow-up page that could not be fetched
#[derive(Debug, Clone, PartialEq)]
pub struct LostPage {
    pub label: String,
    pub url: String,
    pub error: String,
}

/// Outcome of one harvest run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub window: QueryWindow,

    /// Result pages fetched, the first page included
    pub pages_fetched: usize,

    /// Data rows seen across every fetched page
    pub rows_seen: usize,

    /// Records emitted to the sink
    pub records: usize,

    pub row_errors: Vec<RowIssue>,

    pub lost_pages: Vec<LostPage>,
}

impl CrawlReport {
    pub fn new(window: QueryWindow) -> Self {
        Self {
            window,
            pages_fetched: 0,
            rows_seen: 0,
            records: 0,
            row_errors: Vec::new(),
            lost_pages: Vec::new(),
        }
    }

    /// Returns true if every discovered page was fetched
    pub fn is_complete(&self) -> bool {
        self.lost_pages.is_empty()
    }

    /// Returns true if rows were seen and none of them parsed
    pub fn all_rows_failed(&self) -> bool {
        self.rows_seen > 0 && self.records == 0 && self.row_errors.len() == self.rows_seen
    }
}

/// Formats a report as plain text
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    out.push_str("=== Harvest Report ===\n\n");
    out.push_str(&format!("Query window: {}\n", report.window));
    out.push_str(&format!("Pages fetched: {}\n", report.pages_fetched));
    out.push_str(&format!("Rows seen: {}\n", report.rows_seen));
    out.push_str(&format!("Records emitted: {}\n", report.records));
    out.push_str(&format!("Row errors: {}\n", report.row_errors.len()));
    out.push_str(&format!("Lost pages: {}\n", report.lost_pages.len()));

    if !report.row_errors.is_empty() {
        out.push_str("\nRows skipped:\n");
        for issue in &report.row_errors {
            out.push_str(&format!(
                "  - page {}: {} {:?}\n",
                issue.page, issue.reason, issue.cells
            ));
        }
    }

    if !report.lost_pages.is_empty() {
        out.push_str("\nPages not fetched:\n");
        for page in &report.lost_pages {
            out.push_str(&format!(
                "  - page {} ({}): {}\n",
                page.label, page.url, page.error
            ));
        }
    }

    out
}

/// Prints a report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
