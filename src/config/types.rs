use crate::crawler::{DEFAULT_EPOCH, DEFAULT_PAGINATION_SELECTOR, DEFAULT_ROW_SELECTOR};
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Target site and search form contract
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Root of the catalogue; result and detail links are relative to it
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the search form page, relative to `base_url`
    #[serde(rename = "search-path")]
    pub search_path: String,

    /// Form field carrying the lower bound of the query window
    #[serde(rename = "date-from-field")]
    pub date_from_field: String,

    /// Form field carrying the upper bound of the query window
    #[serde(rename = "date-to-field")]
    pub date_to_field: String,

    /// Checkbox-style flag submitted with every search
    #[serde(rename = "flag-field")]
    pub flag_field: String,

    #[serde(rename = "flag-value")]
    pub flag_value: String,

    /// Earliest date the catalogue holds (`DD/MM/YYYY`)
    pub epoch: String,

    /// CSS selector of data rows in the results table
    #[serde(rename = "row-selector")]
    pub row_selector: String,

    /// CSS selector of anchors in the pagination strip
    #[serde(rename = "pagination-selector")]
    pub pagination_selector: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://contenidos.inpres.gob.ar".to_string(),
            search_path: "buscar_sismo".to_string(),
            date_from_field: "datepicker".to_string(),
            date_to_field: "datepicker2".to_string(),
            flag_field: "tilde1".to_string(),
            flag_value: "checkbox".to_string(),
            epoch: DEFAULT_EPOCH.to_string(),
            row_selector: DEFAULT_ROW_SELECTOR.to_string(),
            pagination_selector: DEFAULT_PAGINATION_SELECTOR.to_string(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of result pages fetched at the same time
    #[serde(rename = "max-concurrent-pages")]
    pub max_concurrent_pages: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Retries for server errors and timeouts
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Pause between retries (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages: 4,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 5000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Persisted output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// CSV file or SQLite database holding every collected event
    pub path: PathBuf,

    /// Data-package manifest written next to a CSV output
    pub package: Option<PackageConfig>,
}

/// Data-package manifest metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "resource-name", default)]
    pub resource_name: String,
}
