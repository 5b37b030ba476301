pub mod client;
pub mod payload;
pub mod provider;
pub mod retry;

pub use client::FeedClient;
pub use provider::MatchFeed;
pub use retry::RetryPolicy;

use std::time::Duration;
use thiserror::Error;

/// Why a snapshot fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Client errors that cannot heal by themselves and malformed bodies are
    /// surfaced at once; everything else is worth another attempt.
    pub fn is_retriable(&self, policy: &RetryPolicy) -> bool {
        match self {
            FetchError::HttpStatus { status } => !policy.no_retry_statuses.contains(status),
            FetchError::Malformed(_) => false,
            FetchError::Network(_) | FetchError::Timeout(_) => true,
        }
    }
}
