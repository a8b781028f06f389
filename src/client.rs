//! Quake feed HTTP client.
//!
//! Provides async access to the record feed endpoint.
//! Uses reqwest with rustls for TLS.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use crate::errors::FeedError;
use crate::models::SeismicRecord;
use crate::window::RecordWindow;

/// Default request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Endpoint used by the reference dashboard.
pub const DEFAULT_ENDPOINT: &str = "https://localhost:44316/api/QuakeData";

/// User agent string for feed requests.
const USER_AGENT: &str = concat!("quakeboard/", env!("CARGO_PKG_VERSION"));

/// Query parameter carrying the page size.
const PAGE_SIZE_PARAM: &str = "valuesToShow";

/// Error bodies longer than this are cut in diagnostics.
const MAX_ERROR_BODY: usize = 256;

/// Anything that can produce a fresh record window.
///
/// Implementations must not retry; retry policy lives in the synchronizer.
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    async fn fetch(&self, page_size: NonZeroUsize) -> Result<RecordWindow, FeedError>;
}

/// Feed client settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoint: String,
    pub timeout: Duration,
    /// Accept self-signed certificates (local dev endpoints)
    pub insecure: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            insecure: false,
        }
    }
}

/// Client for the quake feed endpoint.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    endpoint: Url,
}

impl FeedClient {
    /// Create a new feed client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP
    /// client cannot be initialized.
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let endpoint = Url::parse(&config.endpoint)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch up to `page_size` records, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not 2xx, or
    /// the body does not decode into valid records.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch_window(&self, page_size: NonZeroUsize) -> Result<RecordWindow, FeedError> {
        debug!("fetching {} records", page_size);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[(PAGE_SIZE_PARAM, page_size.get())])
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| message.is_char_boundary(i))
                    .unwrap_or(0);
                message.truncate(cut);
                message.push('…');
            }
            return Err(FeedError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let records: Vec<SeismicRecord> = serde_json::from_slice(&body)?;
        let received = records.len();

        // Rows past the page boundary are never shown, so they are not checked.
        let window = RecordWindow::from_feed(records, page_size);
        for (index, record) in window.iter().enumerate() {
            record.validate(index)?;
        }

        debug!("fetched {} records ({} kept)", received, window.len());
        Ok(window)
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, page_size: NonZeroUsize) -> Result<RecordWindow, FeedError> {
        self.fetch_window(page_size).await
    }
}
