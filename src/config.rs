use clap::Parser;
use std::time::Duration;

use crate::feed::retry::NO_RETRY_STATUSES;
use crate::feed::RetryPolicy;
use crate::sync::EngineTimings;

/// Live match feed synchroniser
#[derive(Parser, Debug, Clone)]
#[command(name = "livescore-sync", version, about)]
pub struct Config {
    /// Match feed URL (GET, JSON)
    #[arg(long, env = "FEED_URL")]
    pub feed_url: String,

    /// Value of the identifying `username` header sent with every request
    #[arg(long, env = "FEED_USERNAME")]
    pub feed_username: Option<String>,

    /// Feed polling interval in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "5000")]
    pub poll_interval_ms: u64,

    /// Total fetch attempts per poll, including the first
    #[arg(long, env = "FETCH_ATTEMPTS", default_value = "5")]
    pub fetch_attempts: u32,

    /// Base delay for exponential backoff between attempts (ms)
    #[arg(long, env = "BACKOFF_BASE_MS", default_value = "400")]
    pub backoff_base_ms: u64,

    /// Upper bound for the backoff window (ms)
    #[arg(long, env = "BACKOFF_CAP_MS", default_value = "5000")]
    pub backoff_cap_ms: u64,

    /// Timeout for a single fetch attempt (ms)
    #[arg(long, env = "ATTEMPT_TIMEOUT_MS", default_value = "8000")]
    pub attempt_timeout_ms: u64,

    /// How long newly arrived matches stay highlighted (ms)
    #[arg(long, env = "ARRIVAL_HIGHLIGHT_MS", default_value = "1000")]
    pub arrival_highlight_ms: u64,

    /// How long removed matches stay visible before they disappear (ms)
    #[arg(long, env = "DEPARTURE_DELAY_MS", default_value = "1000")]
    pub departure_delay_ms: u64,

    /// Minimum trimmed search length before the search filter applies
    #[arg(long, env = "SEARCH_MIN_CHARS", default_value = "1")]
    pub search_min_chars: usize,

    /// SQLite database path (favourites record)
    #[arg(long, env = "DATABASE_PATH", default_value = "livescores.db")]
    pub database_path: String,

    /// View API listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(&self.feed_url)
            .map_err(|e| anyhow::anyhow!("FEED_URL is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("FEED_URL must use http or https, got '{}'", url.scheme());
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be positive");
        }
        if self.fetch_attempts == 0 {
            anyhow::bail!("fetch_attempts must be at least 1");
        }
        if self.attempt_timeout_ms == 0 {
            anyhow::bail!("attempt_timeout_ms must be positive");
        }
        if self.backoff_base_ms > self.backoff_cap_ms {
            anyhow::bail!("backoff_base_ms must not exceed backoff_cap_ms");
        }
        if self.search_min_chars == 0 {
            anyhow::bail!("search_min_chars must be at least 1");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.fetch_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_cap_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            no_retry_statuses: NO_RETRY_STATUSES.to_vec(),
        }
    }

    pub fn timings(&self) -> EngineTimings {
        EngineTimings {
            arrival_highlight: Duration::from_millis(self.arrival_highlight_ms),
            departure_delay: Duration::from_millis(self.departure_delay_ms),
        }
    }
}
