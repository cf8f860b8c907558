// src/error.rs
//! Error taxonomy. Parse and fetch errors are per-source and never fatal to an
//! aggregation; `AggregateError::NoData` is the only fatal condition.

use std::time::Duration;
use thiserror::Error;

/// The input could not be read as an XML document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed xml at byte {position}: {message}")]
    Malformed { position: u64, message: String },
    #[error("document has no root element")]
    NoRootElement,
    #[error("element <{0}> is not closed at end of document")]
    Unclosed(String),
}

/// Why a single source produced no items.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {}s", .timeout.as_secs_f32())]
    Timeout { url: String, timeout: Duration },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not parse feed from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
    #[error("{url} is cooling down after a failed fetch ({}s left)", .remaining.as_secs())]
    CoolingDown { url: String, remaining: Duration },
}

impl FetchError {
    /// Timeout, connection failure or non-2xx status.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout { .. } | FetchError::Network { .. } | FetchError::Status { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Network { .. } => "network",
            FetchError::Status { .. } => "status",
            FetchError::Parse { .. } => "parse",
            FetchError::CoolingDown { .. } => "cooldown",
        }
    }

    pub(crate) fn from_reqwest(url: &str, timeout: Duration, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::Timeout {
                url: url.to_string(),
                timeout,
            };
        }
        if let Some(status) = e.status() {
            return FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            };
        }
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Fatal outcome of the atomic aggregation path.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no news items could be fetched from {sources} configured sources")]
    NoData { sources: usize },
}
