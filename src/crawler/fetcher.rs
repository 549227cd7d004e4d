//! HTTP fetcher implementation
//!
//! This module is the crawl's only point of network I/O. It handles:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for the search page and result pages
//! - Form submission (GET query or POST body)
//! - Retry logic for transient failures
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::form::{FormMethod, FormRequest};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Fetch-level failures
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Other { url: String, message: String },
}

impl FetchError {
    /// Returns true if the request may succeed when sent again
    ///
    /// | Condition | Retried |
    /// |-----------|---------|
    /// | HTTP 5xx | yes |
    /// | Timeout | yes |
    /// | HTTP 4xx | no |
    /// | Connection refused / DNS / TLS | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// URL of the failed request
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Body { url, .. }
            | Self::Other { url, .. } => url,
        }
    }

    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect {
                url,
                message: error.to_string(),
            }
        } else {
            Self::Other {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// The fetch collaborator used by the crawl coordinator
///
/// Implementations return response bodies as text; parsing is left to the
/// caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a page with a plain GET request
    async fn get(&self, url: &Url) -> Result<String, FetchError>;

    /// Submits a filled-in form
    async fn submit(&self, request: &FormRequest) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```no_run
/// use inpres_harvest::config::UserAgentConfig;
/// use inpres_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "InpresHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format_user_agent(user_agent))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Formats the user agent: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Production fetcher backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler and user agent settings
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(crawler.request_timeout_secs),
        )?;

        Ok(Self {
            client,
            max_retries: crawler.max_retries,
            retry_delay: Duration::from_millis(crawler.retry_delay_ms),
        })
    }

    /// Sends the request built by `build`, retrying transient failures
    async fn send_with_retry<F>(&self, url: &Url, build: F) -> Result<String, FetchError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;

        loop {
            match send_once(url, build()).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "{} (attempt {}/{}), retrying in {:?}",
                        e,
                        attempt,
                        self.max_retries,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        tracing::debug!("GET {}", url);
        self.send_with_retry(url, || self.client.get(url.clone()))
            .await
    }

    async fn submit(&self, request: &FormRequest) -> Result<String, FetchError> {
        tracing::debug!(
            "{} {} with {} fields",
            request.method,
            request.url,
            request.fields.len()
        );

        self.send_with_retry(&request.url, || match request.method {
            FormMethod::Get => self.client.get(request.url.clone()).query(&request.fields),
            FormMethod::Post => self.client.post(request.url.clone()).form(&request.fields),
        })
        .await
    }
}

/// Sends one request and classifies the outcome
async fn send_once(url: &Url, request: RequestBuilder) -> Result<String, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| FetchError::Body {
        url: url.to_string(),
        message: e.to_string(),
    })
}
