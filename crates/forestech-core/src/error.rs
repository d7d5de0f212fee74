//! Error types for the Forestech client core.
//!
//! Every failure surfaced by the HTTP layer, the cache and the services is a
//! [`ForestechError`]. The [`FailureClass`] view drives retry decisions,
//! disconnection reporting and user notifications.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the Forestech client core.
#[derive(Debug, Error)]
pub enum ForestechError {
    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    // Application HTTP errors
    #[error("{service} {operation} failed with HTTP {status}: {body}")]
    Http {
        service: String,
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Forestech operations.
pub type Result<T> = std::result::Result<T, ForestechError>;

/// How a failure should be treated by retries, the connection monitor and
/// the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No HTTP response at all: refused connection, DNS, timeout.
    Network,
    /// 5xx other than 503.
    TransientServer,
    /// 503, the backend is deliberately shedding load.
    Degraded,
    /// 429.
    RateLimited,
    /// Any other 4xx.
    Client,
    /// Aborted by the caller. Not an error from the user's point of view.
    Cancelled,
    /// Decode, configuration and other local failures.
    Internal,
}

impl FailureClass {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FailureClass::RateLimited,
            503 => FailureClass::Degraded,
            500..=599 => FailureClass::TransientServer,
            400..=499 => FailureClass::Client,
            _ => FailureClass::Internal,
        }
    }
}

// Conversion implementations for common error types

impl From<serde_json::Error> for ForestechError {
    fn from(err: serde_json::Error) -> Self {
        ForestechError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<url::ParseError> for ForestechError {
    fn from(err: url::ParseError) -> Self {
        ForestechError::InvalidUrl {
            url: String::new(),
            message: err.to_string(),
        }
    }
}

impl ForestechError {
    /// Map a transport error, keeping the configured timeout for context.
    pub fn from_transport(err: reqwest::Error, operation: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            ForestechError::Timeout(timeout)
        } else if err.is_decode() {
            ForestechError::Json {
                message: format!("{} returned an unreadable body: {}", operation, err),
                source: None,
            }
        } else {
            ForestechError::Network {
                message: format!("{} failed: {}", operation, err),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }

    /// The HTTP status carried by this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ForestechError::Http { status, .. } => Some(*status),
            ForestechError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    pub fn failure_class(&self) -> FailureClass {
        match self {
            ForestechError::Network { .. } | ForestechError::Timeout(_) => FailureClass::Network,
            ForestechError::Http { status, .. } => FailureClass::from_status(*status),
            ForestechError::RateLimited { .. } => FailureClass::RateLimited,
            ForestechError::Cancelled => FailureClass::Cancelled,
            ForestechError::Json { .. }
            | ForestechError::InvalidUrl { .. }
            | ForestechError::Config { .. }
            | ForestechError::Other(_) => FailureClass::Internal,
        }
    }

    /// True when no HTTP response was received.
    pub fn is_network(&self) -> bool {
        self.failure_class() == FailureClass::Network
    }

    /// Check if this error should trigger a retry.
    ///
    /// Only network-class failures and 5xx responses other than 503 qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.failure_class(),
            FailureClass::Network | FailureClass::TransientServer
        )
    }

    /// Retry decision for a request that may or may not be safe to repeat.
    ///
    /// Network-class failures are retried for every method. A 5xx response
    /// means the server may already have applied the request, so it is only
    /// retried for idempotent methods.
    pub fn is_retryable_for(&self, idempotent: bool) -> bool {
        match self.failure_class() {
            FailureClass::Network => true,
            FailureClass::TransientServer => idempotent,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ForestechError::Cancelled)
    }
}
