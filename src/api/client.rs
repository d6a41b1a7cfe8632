//! HTTP client for the observations endpoint
//!
//! Wraps `reqwest` with the query parameter sets of the remote API, a
//! token bucket rate limiter and bounded retries with exponential backoff.

use super::rate_limit::RateLimiter;
use super::PageFetcher;
use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::types::QueryWindow;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the paginated observations endpoint
pub struct ApiClient {
    http: Client,
    base_url: String,
    place_id: u32,
    taxon_id: u32,
    limiter: RateLimiter,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    base_url: String,
    place_id: u32,
    taxon_id: u32,
    timeout: Duration,
    max_retries: u32,
    requests_per_second: u32,
    burst_size: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl ApiClientBuilder {
    /// Start a builder for the given place and taxon filters
    pub fn new(place_id: u32, taxon_id: u32) -> Self {
        Self {
            base_url: "https://api.inaturalist.org/v1".to_string(),
            place_id,
            taxon_id,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            requests_per_second: 1,
            burst_size: 1,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Set the API base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum transport-level retries per request
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set rate limiting parameters
    #[must_use]
    pub fn rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self.burst_size = burst_size;
        self
    }

    /// Set the backoff range for retries
    #[must_use]
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient> {
        let http = Client::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .user_agent(format!("inat-harvest/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Http)?;

        Ok(ApiClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            place_id: self.place_id,
            taxon_id: self.taxon_id,
            limiter: RateLimiter::new(self.requests_per_second, self.burst_size),
            timeout: self.timeout,
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
        })
    }
}

impl ApiClient {
    /// Build a client from a harvest configuration
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        ApiClientBuilder::new(config.place_id, config.taxon_id)
            .base_url(&config.base_url)
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .max_retries(config.http.max_retries)
            .rate_limit(config.http.requests_per_second, config.http.burst_size)
            .build()
    }

    /// The underlying HTTP client, shared with the session login so the
    /// cookie jar carries over
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Query parameters common to every observations request
    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("verifiable", "true".to_string()),
            ("spam", "false".to_string()),
            ("locale", "en".to_string()),
            ("return_bounds", "true".to_string()),
            ("place_id", self.place_id.to_string()),
            ("taxon_id", self.taxon_id.to_string()),
        ]
    }

    /// GET the observations endpoint with retries and rate limiting
    async fn get_observations(&self, params: Vec<(&'static str, String)>) -> Result<Value> {
        let url = format!("{}/observations", self.base_url);
        let mut attempt = 0u32;

        loop {
            self.limiter.acquire().await;

            match self.http.get(&url).query(&params).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = extract_retry_after(&response);
                        if attempt < self.max_retries {
                            warn!(
                                attempt = attempt + 1,
                                retry_after, "rate limited (429), backing off"
                            );
                            tokio::time::sleep(Duration::from_secs(retry_after)).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(Error::RateLimited {
                            retry_after_seconds: retry_after,
                        });
                    }

                    if is_retryable_status(status) && attempt < self.max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            status = status.as_u16(),
                            attempt = attempt + 1,
                            ?delay,
                            "retryable server error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::http_status(status.as_u16(), body));
                    }

                    debug!(%url, "observations request succeeded");
                    return response.json().await.map_err(Error::Http);
                }
                Err(e) => {
                    if e.is_timeout() {
                        if attempt < self.max_retries {
                            let delay = self.calculate_backoff(attempt);
                            warn!(attempt = attempt + 1, ?delay, "request timeout, retrying");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                        return Err(Error::Timeout {
                            timeout_ms: self.timeout.as_millis() as u64,
                        });
                    }

                    if e.is_connect() && attempt < self.max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(attempt = attempt + 1, ?delay, "connection error, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(Error::Http(e));
                }
            }
        }
    }

    /// Exponential backoff for a given attempt, clamped to the maximum
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(self.initial_backoff * factor, self.max_backoff)
    }
}

#[async_trait]
impl PageFetcher for ApiClient {
    async fn oldest_observation_date(&self) -> Result<NaiveDate> {
        let mut params = self.base_params();
        params.push(("order_by", "observed_on".to_string()));
        params.push(("order", "asc".to_string()));
        params.push(("page", "1".to_string()));
        params.push(("per_page", "1".to_string()));

        let page = self.get_observations(params).await?;

        let date_str = page
            .pointer("/results/0/observed_on_details/date")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::oldest_record("no dated results for the configured place and taxon")
            })?;

        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|e| Error::oldest_record(format!("unparseable date '{date_str}': {e}")))?;

        debug!(%date, "oldest observation date discovered");
        Ok(date)
    }

    async fn fetch_page(&self, window: &QueryWindow) -> Result<Value> {
        let mut params = self.base_params();
        params.push(("order_by", "observed_on".to_string()));
        params.push(("order", "asc".to_string()));
        params.push(("page", window.page.to_string()));
        params.push(("per_page", window.per_page.to_string()));
        params.push(("d1", window.lower.format("%Y-%m-%d").to_string()));
        params.push(("d2", window.upper.format("%Y-%m-%d").to_string()));

        self.get_observations(params).await
    }

    async fn fetch_page_unfiltered(&self, page: u32, per_page: u32) -> Result<Value> {
        let mut params = self.base_params();
        params.push(("order_by", "observations.id".to_string()));
        params.push(("order", "desc".to_string()));
        params.push(("page", page.to_string()));
        params.push(("per_page", per_page.to_string()));

        self.get_observations(params).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("place_id", &self.place_id)
            .field("taxon_id", &self.taxon_id)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Check if an HTTP status is worth a retry
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

/// Extract the retry-after header value, defaulting to 60 seconds
fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
