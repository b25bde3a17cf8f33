//! Crossref API client
//!
//! Resolves a DOI to the registered publisher name and the DOI-prefix
//! owner name, used as candidates when disambiguating publisher spellings.
//! Requests are rate limited to one per second and fail with a typed
//! [`LookupError`] instead of aborting the run.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const CROSSREF_BASE_URL: &str = "https://api.crossref.org";
const USER_AGENT: &str = "apc-merge/0.1.0 (APC master dataset reconciliation)";
const RATE_LIMIT_MS: u64 = 1000; // 1 request per second
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Typed lookup failure. All variants are recoverable: the caller keeps
/// the unnormalized publisher name and records a warning.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("DOI not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Candidate publisher names for one DOI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherNames {
    /// Full registered publisher name
    pub publisher: String,
    /// Shorter prefix-owner name
    pub prefix_name: String,
}

/// Source of publisher-name metadata keyed by DOI.
///
/// Production uses [`CrossrefClient`]; tests substitute a canned lookup so
/// normalization paths run without network access.
pub trait PublisherLookup {
    fn publisher_names(
        &self,
        doi: &str,
    ) -> impl std::future::Future<Output = Result<PublisherNames, LookupError>> + Send;
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorkMessage,
}

#[derive(Debug, Deserialize)]
struct WorkMessage {
    publisher: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PrefixResponse {
    message: PrefixMessage,
}

#[derive(Debug, Deserialize)]
struct PrefixMessage {
    name: Option<String>,
}

/// Rate limiter enforcing 1 request/second
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Crossref REST API client
pub struct CrossrefClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl CrossrefClient {
    pub fn new() -> Result<Self, LookupError> {
        Self::with_base_url(CROSSREF_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            base_url: base_url.into(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        doi: &str,
    ) -> Result<T, LookupError> {
        self.rate_limiter.wait().await;

        tracing::debug!(doi = %doi, url = %url, "Querying Crossref API");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();

        if status == 404 {
            return Err(LookupError::NotFound(doi.to_string()));
        }

        if !status.is_success() {
            return Err(LookupError::Transport(format!(
                "HTTP {} from {}",
                status.as_u16(),
                url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::Malformed(e.to_string()))
    }
}

impl PublisherLookup for CrossrefClient {
    /// Lookup publisher-name candidates for one DOI.
    ///
    /// Two sequential requests: `/works/{doi}` for the full publisher name
    /// and DOI prefix, then `/prefixes/{prefix}` for the prefix owner name.
    async fn publisher_names(&self, doi: &str) -> Result<PublisherNames, LookupError> {
        let works_url = format!("{}/works/{}", self.base_url, doi.trim());
        let works: WorksResponse = self.get_json(&works_url, doi).await?;

        let publisher = works
            .message
            .publisher
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| LookupError::Malformed(format!("no publisher name for {}", doi)))?;
        let prefix = works
            .message
            .prefix
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| LookupError::Malformed(format!("no DOI prefix for {}", doi)))?;

        let prefix_url = format!("{}/prefixes/{}", self.base_url, prefix.trim());
        let prefix_info: PrefixResponse = self.get_json(&prefix_url, doi).await?;

        let prefix_name = prefix_info
            .message
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| LookupError::Malformed(format!("no prefix name for {}", prefix)))?;

        tracing::info!(
            doi = %doi,
            publisher = %publisher,
            prefix_name = %prefix_name,
            "Retrieved publisher names from Crossref"
        );

        Ok(PublisherNames {
            publisher: publisher.trim().to_string(),
            prefix_name: prefix_name.trim().to_string(),
        })
    }
}
