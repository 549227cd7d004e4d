//! Crawler module for the search-and-harvest flow
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with retry logic
//! - Search form replay
//! - Result page walking and row parsing
//! - Query window planning
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod form;
mod page;
mod planner;
mod row;

pub use coordinator::{run_crawl, Coordinator, FIRST_PAGE_LABEL};
pub use fetcher::{build_http_client, format_user_agent, FetchError, Fetcher, HttpFetcher};
pub use form::{FormMethod, FormRequest, SearchForm};
pub use page::{
    PageDescriptor, PageWalker, RawCell, RawRow, DEFAULT_PAGINATION_SELECTOR,
    DEFAULT_ROW_SELECTOR, FELT_MARKER_COLOR,
};
pub use planner::{
    parse_window_date, plan_window, try_plan_window, PlannerError, QueryWindow, DEFAULT_EPOCH,
    WINDOW_DATE_FORMAT,
};
pub use row::{depth_token, parse_row, RowErrorKind, RowParseError, DATA_COLUMNS};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::storage::EventStore;
use crate::HarvestError;

/// Runs one incremental harvest
///
/// This is the main entry point for a run. It will:
/// 1. Fetch the search form
/// 2. Plan the query window from the stored events
/// 3. Submit the search
/// 4. Harvest the first result page and the pages it lists
/// 5. Finish the store with the run report
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `store` - Where records go, and where the previous run's output is read
pub async fn crawl(
    config: Config,
    store: &mut dyn EventStore,
) -> Result<CrawlReport, HarvestError> {
    run_crawl(config, store).await
}
