//! Crawl coordinator - drives one incremental harvest run
//!
//! A run moves through the phases of [`CrawlPhase`]:
//! - fetch the search page
//! - plan the query window and submit the form
//! - harvest the first result page and read its pagination strip
//! - fetch the remaining pages concurrently and harvest them in discovery order

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, Fetcher, HttpFetcher};
use crate::crawler::form::SearchForm;
use crate::crawler::page::{PageDescriptor, PageWalker};
use crate::crawler::planner::{parse_window_date, plan_window};
use crate::crawler::row::parse_row;
use crate::output::{CrawlReport, LostPage, RowIssue};
use crate::state::CrawlPhase;
use crate::storage::EventStore;
use crate::url::join_site;
use crate::{ConfigError, HarvestError};
use chrono::{Local, NaiveDate};
use futures_util::stream::{self, StreamExt};
use scraper::Html;
use std::sync::Arc;
use url::Url;

/// Label given to the page returned by the form submission
pub const FIRST_PAGE_LABEL: &str = "1";

/// Main crawl coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    walker: PageWalker,
    base_url: Url,
    epoch: NaiveDate,
    phase: CrawlPhase,
}

impl Coordinator {
    /// Creates a coordinator that fetches through `fetcher`
    ///
    /// # Errors
    ///
    /// Fails if the site URL, the epoch or the selectors in `config` are invalid
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.site.base_url)?;
        let epoch = parse_window_date(&config.site.epoch).ok_or_else(|| {
            ConfigError::Validation(format!("epoch '{}' is not a DD/MM/YYYY date", config.site.epoch))
        })?;
        let walker = PageWalker::new(&config.site.row_selector, &config.site.pagination_selector)?;

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            walker,
            base_url,
            epoch,
            phase: CrawlPhase::Start,
        })
    }

    /// Creates a coordinator backed by an HTTP fetcher built from `config`
    pub fn from_config(config: Config) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::new(&config.crawler, &config.user_agent)?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Current phase of the run
    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// URL of the search form page
    pub fn search_url(&self) -> Result<Url, HarvestError> {
        Ok(join_site(&self.base_url, &self.config.site.search_path)?)
    }

    /// Runs one harvest with today's date as the upper bound of the window
    pub async fn run(&mut self, store: &mut dyn EventStore) -> Result<CrawlReport, HarvestError> {
        let today = Local::now().date_naive();
        self.run_until(store, today).await
    }

    /// Runs one harvest for the window ending on `today`
    ///
    /// Records are handed to `store` as they are parsed, first page first and
    /// each page in row order. The store is finished only if the run produced
    /// a usable result.
    ///
    /// # Errors
    ///
    /// - The search page or the form submission could not be fetched
    /// - The search page has no form
    /// - Rows were found but none of them parsed
    /// - The store rejected a record
    pub async fn run_until(
        &mut self,
        store: &mut dyn EventStore,
        today: NaiveDate,
    ) -> Result<CrawlReport, HarvestError> {
        self.phase = CrawlPhase::Start;

        let search_url = self.search_url()?;
        tracing::info!("Fetching search form from {}", search_url);
        let search_page = self.fetcher.get(&search_url).await.map_err(|e| {
            tracing::error!("Search page unavailable: {}", e);
            e
        })?;

        self.advance(CrawlPhase::FormFill)?;
        let form = SearchForm::from_page(&search_page, &search_url).ok_or_else(|| {
            HarvestError::FormNotFound {
                url: search_url.to_string(),
            }
        })?;

        let window = plan_window(&*store, self.epoch, today);
        let site = &self.config.site;
        let request = form.fill(&[
            (site.date_from_field.clone(), window.form_from()),
            (site.date_to_field.clone(), window.form_to()),
            (site.flag_field.clone(), site.flag_value.clone()),
        ]);
        tracing::info!("Submitting search for {} to {}", window, request.url);
        let first_page = self.fetcher.submit(&request).await.map_err(|e| {
            tracing::error!("Search submission failed: {}", e);
            e
        })?;

        self.advance(CrawlPhase::FirstPage)?;
        let mut report = CrawlReport::new(window);
        let links = self.harvest_page(&first_page, FIRST_PAGE_LABEL, store, &mut report)?;
        tracing::info!("First page done, {} further pages listed", links.len());

        self.advance(CrawlPhase::FollowPages)?;
        self.follow_pages(links, store, &mut report).await?;

        if report.all_rows_failed() {
            tracing::error!(
                "None of the {} rows parsed; not writing output",
                report.rows_seen
            );
            return Err(HarvestError::LayoutChanged {
                rows: report.rows_seen,
            });
        }

        store.finish(&report)?;
        self.advance(CrawlPhase::Done)?;

        tracing::info!(
            "Harvest finished: {} records from {} pages, {} rows skipped, {} pages lost",
            report.records,
            report.pages_fetched,
            report.row_errors.len(),
            report.lost_pages.len()
        );

        Ok(report)
    }

    /// Fetches the listed pages and harvests them in discovery order
    ///
    /// A page that cannot be fetched is recorded as lost and the run goes on.
    async fn follow_pages(
        &self,
        links: Vec<PageDescriptor>,
        store: &mut dyn EventStore,
        report: &mut CrawlReport,
    ) -> Result<(), HarvestError> {
        let mut targets = Vec::with_capacity(links.len());
        for page in links {
            match join_site(&self.base_url, &page.href) {
                Ok(url) => targets.push((page, url)),
                Err(e) => {
                    tracing::warn!("Page {} has an unusable link {:?}: {}", page.label, page.href, e);
                    report.lost_pages.push(LostPage {
                        label: page.label,
                        url: page.href,
                        error: e.to_string(),
                    });
                }
            }
        }

        let limit = self.config.crawler.max_concurrent_pages.max(1) as usize;
        let fetcher = Arc::clone(&self.fetcher);
        let mut pages = stream::iter(targets)
            .map(|(page, url)| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    let body: Result<String, FetchError> = fetcher.get(&url).await;
                    (page, url, body)
                }
            })
            .buffered(limit);

        while let Some((page, url, body)) = pages.next().await {
            match body {
                Ok(body) => {
                    self.harvest_page(&body, &page.label, store, report)?;
                }
                Err(e) => {
                    tracing::warn!("Lost page {} ({}): {}", page.label, url, e);
                    report.lost_pages.push(LostPage {
                        label: page.label,
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Parses every row of one result page into the store
    ///
    /// Returns the pagination links of the page.
    fn harvest_page(
        &self,
        body: &str,
        label: &str,
        store: &mut dyn EventStore,
        report: &mut CrawlReport,
    ) -> Result<Vec<PageDescriptor>, HarvestError> {
        let document = Html::parse_document(body);
        report.pages_fetched += 1;

        let mut emitted = 0;
        for row in self.walker.rows(&document) {
            report.rows_seen += 1;
            match parse_row(&row, &self.base_url) {
                Ok(record) => {
                    store.accept(&record)?;
                    report.records += 1;
                    emitted += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping row on page {}: {}", label, e);
                    report.row_errors.push(RowIssue {
                        page: label.to_string(),
                        cells: e.cells,
                        reason: e.kind.to_string(),
                    });
                }
            }
        }
        tracing::debug!("Page {}: {} records", label, emitted);

        Ok(self.walker.page_links(&document))
    }

    fn advance(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }
}

/// Runs one harvest over HTTP into `store`
///
/// # Example
///
/// ```no_run
/// use inpres_harvest::config::load_config;
/// use inpres_harvest::crawler::run_crawl;
/// use inpres_harvest::storage::open_store;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let mut store = open_store(&config.output, "")?;
/// let report = run_crawl(config, store.as_mut()).await?;
/// println!("{} records", report.records);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    store: &mut dyn EventStore,
) -> Result<CrawlReport, HarvestError> {
    let mut coordinator = Coordinator::from_config(config)?;
    coordinator.run(store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlerConfig, OutputConfig, OutputFormat, SiteConfig, UserAgentConfig};
    use crate::crawler::form::FormRequest;
    use crate::record::Record;
    use crate::storage::{PriorOutput, RecordSink, StorageResult};
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const BASE: &str = "http://inpres.test";

    /// Serves canned bodies keyed by URL and remembers submitted forms
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        results: String,
        submitted: Mutex<Vec<FormRequest>>,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn get(&self, url: &Url) -> Result<String, FetchError> {
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }

        async fn submit(&self, request: &FormRequest) -> Result<String, FetchError> {
            self.submitted.lock().unwrap().push(request.clone());
            Ok(self.results.clone())
        }
    }

    /// In-memory store with an optional latest timestamp
    #[derive(Default)]
    struct MemoryStore {
        latest: Option<NaiveDateTime>,
        records: Vec<Record>,
        finished: bool,
    }

    impl RecordSink for MemoryStore {
        fn accept(&mut self, record: &Record) -> StorageResult<()> {
            self.records.push(record.clone());
            Ok(())
        }

        fn finish(&mut self, _report: &CrawlReport) -> StorageResult<()> {
            self.finished = true;
            Ok(())
        }
    }

    impl PriorOutput for MemoryStore {
        fn latest_timestamp(&self) -> StorageResult<Option<NaiveDateTime>> {
            Ok(self.latest)
        }

        fn load_all(&self) -> StorageResult<Vec<Record>> {
            Ok(self.records.clone())
        }
    }

    fn create_test_config() -> Config {
        Config {
            site: SiteConfig {
                base_url: BASE.to_string(),
                ..SiteConfig::default()
            },
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestHarvester".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                format: OutputFormat::Csv,
                path: "inpres.csv".into(),
                package: None,
            },
        }
    }

    const FORM: &str = r#"<form method="post" action="buscar_sismo">
        <input name="datepicker"><input name="datepicker2">
        <input type="checkbox" name="tilde1" value="checkbox">
        <input type="submit" name="Submit" value="Buscar"></form>"#;

    fn row(id: u32, date: &str) -> String {
        format!(
            r#"<tr class="Estilo68"><td></td><td>{date}</td><td>10:00:00</td><td>-31.5</td>
            <td>-68.6</td><td>15 Km</td><td>3.2</td><td></td><td>San Juan</td>
            <td><a href="ver/{id}/detalle">ver</a></td></tr>"#
        )
    }

    fn results(rows: &[String], pages: &[&str]) -> String {
        let mut html = String::from(
            r#"<table id="sismos"><tr class="Estilo68"><td>Fecha</td></tr>"#,
        );
        for r in rows {
            html.push_str(r);
        }
        html.push_str(r#"</table><table><tr><td class="Estilo68">"#);
        for p in pages {
            html.push_str(&format!(r#"<a href="buscar_sismo?pagina={p}">{p}</a>"#));
        }
        html.push_str(r#"<a href="buscar_sismo?pagina=ultima">&gt;&gt;</a></td></tr></table>"#);
        html
    }

    fn fetcher(first: String, follow: &[(&str, String)]) -> FakeFetcher {
        let mut pages = HashMap::new();
        pages.insert(format!("{}/buscar_sismo", BASE), FORM.to_string());
        for (p, body) in follow {
            pages.insert(format!("{}/buscar_sismo?pagina={}", BASE, p), body.clone());
        }
        FakeFetcher {
            pages,
            results: first,
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, 3).unwrap()
    }

    #[tokio::test]
    async fn test_run_emits_records_in_page_order() {
        let first = results(&[row(1, "01/05/2023"), row(2, "01/05/2023")], &["2"]);
        let second = results(&[row(3, "02/05/2023")], &[]);
        let fake = Arc::new(fetcher(first, &[("2", second)]));

        let mut coordinator = Coordinator::new(create_test_config(), fake.clone()).unwrap();
        let mut store = MemoryStore::default();
        let report = coordinator.run_until(&mut store, today()).await.unwrap();

        let ids: Vec<i64> = store.records.iter().map(Record::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(report.pages_fetched, 2);
        assert!(report.is_complete());
        assert!(store.finished);
        assert_eq!(coordinator.phase(), CrawlPhase::Done);

        let submitted = fake.submitted.lock().unwrap();
        assert_eq!(submitted[0].field("datepicker"), Some("29/07/1998"));
        assert_eq!(submitted[0].field("datepicker2"), Some("03/05/2023"));
        assert_eq!(submitted[0].field("tilde1"), Some("checkbox"));
    }

    #[tokio::test]
    async fn test_window_resumes_from_store() {
        let fake = Arc::new(fetcher(results(&[row(1, "02/05/2023")], &[]), &[]));
        let mut coordinator = Coordinator::new(create_test_config(), fake.clone()).unwrap();
        let mut store = MemoryStore {
            latest: NaiveDateTime::parse_from_str("2023-05-01 23:00:00", "%Y-%m-%d %H:%M:%S").ok(),
            ..MemoryStore::default()
        };

        let report = coordinator.run_until(&mut store, today()).await.unwrap();
        assert_eq!(report.window.form_from(), "01/05/2023");
        assert_eq!(
            fake.submitted.lock().unwrap()[0].field("datepicker"),
            Some("01/05/2023")
        );
    }

    #[tokio::test]
    async fn test_lost_follow_page_is_reported() {
        let first = results(&[row(1, "01/05/2023")], &["2", "3"]);
        let third = results(&[row(5, "02/05/2023")], &[]);
        let fake = Arc::new(fetcher(first, &[("3", third)]));

        let mut coordinator = Coordinator::new(create_test_config(), fake).unwrap();
        let mut store = MemoryStore::default();
        let report = coordinator.run_until(&mut store, today()).await.unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.lost_pages.len(), 1);
        assert_eq!(report.lost_pages[0].label, "2");
        assert!(store.finished);
    }

    #[tokio::test]
    async fn test_missing_form_is_fatal() {
        let mut fake = fetcher(String::new(), &[]);
        fake.pages
            .insert(format!("{}/buscar_sismo", BASE), "<p>mantenimiento</p>".to_string());

        let mut coordinator = Coordinator::new(create_test_config(), Arc::new(fake)).unwrap();
        let mut store = MemoryStore::default();
        let result = coordinator.run_until(&mut store, today()).await;

        assert!(matches!(result, Err(HarvestError::FormNotFound { .. })));
        assert_eq!(coordinator.phase(), CrawlPhase::FormFill);
    }

    #[tokio::test]
    async fn test_every_row_failing_is_layout_change() {
        let broken = r#"<tr class="Estilo68"><td>?</td><td>??</td></tr>"#.to_string();
        let fake = Arc::new(fetcher(results(&[broken.clone(), broken], &[]), &[]));

        let mut coordinator = Coordinator::new(create_test_config(), fake).unwrap();
        let mut store = MemoryStore::default();
        let result = coordinator.run_until(&mut store, today()).await;

        assert!(matches!(result, Err(HarvestError::LayoutChanged { rows: 2 })));
        assert!(!store.finished);
    }

    #[tokio::test]
    async fn test_empty_result_finishes() {
        let fake = Arc::new(fetcher(results(&[], &[]), &[]));
        let mut coordinator = Coordinator::new(create_test_config(), fake).unwrap();
        let mut store = MemoryStore::default();

        let report = coordinator.run_until(&mut store, today()).await.unwrap();
        assert_eq!(report.records, 0);
        assert!(store.finished);
    }

    #[test]
    fn test_search_url() {
        let coordinator =
            Coordinator::new(create_test_config(), Arc::new(FakeFetcher::default())).unwrap();
        assert_eq!(
            coordinator.search_url().unwrap().as_str(),
            "http://inpres.test/buscar_sismo"
        );
    }
}
