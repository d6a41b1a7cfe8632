//! Error types for the harvester
//!
//! Every public API returns `Result<T, Error>` with the error defined here.
//! The taxonomy distinguishes fatal configuration errors (fix a value and
//! rerun) from retryable transport errors (the checkpoint survives and the
//! next run resumes automatically).

use thiserror::Error;

/// The main error type for the harvester
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(
        "start_page {start_page} with per_page {per_page} exceeds the API offset cap \
         ({start_page} * {per_page} > 10000) and no checkpoint exists to resume from; \
         select a lower start_page and rerun"
    )]
    InvalidStartPage { start_page: u32, per_page: u32 },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Upstream Errors
    // ============================================================================
    #[error(
        "the oldest observation date could not be obtained from the API: {message}; \
         check place_id and taxon_id"
    )]
    OldestRecordUnavailable { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Checkpoint / Sink Errors
    // ============================================================================
    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },

    #[error("Sink write failed: {message}")]
    Sink { message: String },

    // ============================================================================
    // Controller Errors
    // ============================================================================
    #[error(
        "window rollover stalled: more than the offset cap of records share the \
         observed date {date}; the window lower bound cannot advance"
    )]
    WindowStalled { date: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
        }
    }

    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Create an oldest-record error
    pub fn oldest_record(message: impl Into<String>) -> Self {
        Self::OldestRecordUnavailable {
            message: message.into(),
        }
    }

    /// Check if this error is a transient transport fault worth retrying.
    ///
    /// Only these categories are retried during paging; everything else is
    /// surfaced immediately so the user can correct the configuration.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } | Error::Timeout { .. } => true,
            // Transport errors are only transient when the wire itself
            // failed; builder and body-decode errors will fail identically
            // on a refetch.
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check whether a resume will pick up where this failure left off.
    ///
    /// True for faults that abort a run mid-harvest while the checkpoint
    /// file remains on disk.
    pub fn resume_preserved(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::HttpStatus { .. }
                | Error::RateLimited { .. }
                | Error::Timeout { .. }
                | Error::Sink { .. }
        )
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the harvester
pub type Result<T> = std::result::Result<T, Error>;
