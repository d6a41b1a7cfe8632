//! Remote API access
//!
//! HTTP client for the observations endpoint, with per-request timeout,
//! bounded retries with exponential backoff, token bucket rate limiting and
//! an optional website session login.
//!
//! The controller consumes this module only through the [`PageFetcher`]
//! trait, so tests can substitute a scripted fetcher.

mod client;
mod rate_limit;
mod session;

pub use client::{ApiClient, ApiClientBuilder};
pub use rate_limit::RateLimiter;
pub use session::SessionAuth;

use crate::error::Result;
use crate::types::QueryWindow;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// One page fetch against the remote API.
///
/// The two query modes mirror the remote endpoint: date-ascending filtered
/// (normal operation) and unfiltered-by-offset (provided for completeness,
/// not exercised by the default harvest policy).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Observed date of the single oldest record matching the configured
    /// place and taxon filters
    async fn oldest_observation_date(&self) -> Result<NaiveDate>;

    /// Fetch one page of the date-ascending filtered query
    async fn fetch_page(&self, window: &QueryWindow) -> Result<Value>;

    /// Fetch one page of the unfiltered query, newest first
    async fn fetch_page_unfiltered(&self, page: u32, per_page: u32) -> Result<Value>;
}

#[cfg(test)]
mod tests;
