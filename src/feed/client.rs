use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, info};

use super::payload::decode_body;
use super::provider::MatchFeed;
use super::retry::{retry_with_backoff, RetryPolicy};
use super::FetchError;
use crate::db::models::Match;

/// HTTP transport for the match feed.
///
/// Every fetch is a GET against a fixed URL, retried per `RetryPolicy`.
#[derive(Clone)]
pub struct FeedClient {
    http: Client,
    url: String,
    headers: HeaderMap,
    policy: RetryPolicy,
}

impl FeedClient {
    /// `username` is sent as the feed's identifying header when present.
    pub fn new(url: &str, username: Option<&str>, policy: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(name) = username {
            headers.insert(
                HeaderName::from_static("username"),
                HeaderValue::from_str(name).context("Feed username is not a valid header value")?,
            );
        }

        Ok(FeedClient {
            http,
            url: url.to_string(),
            headers,
            policy,
        })
    }

    async fn fetch_once(&self, attempt: u32) -> Result<Vec<Match>, FetchError> {
        debug!("Fetching feed {} (attempt {})", self.url, attempt);

        let resp = self
            .http
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        decode_body(&body)
    }
}

#[async_trait]
impl MatchFeed for FeedClient {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch_snapshot(&self) -> Result<Vec<Match>, FetchError> {
        let matches = retry_with_backoff(&self.policy, |attempt| self.fetch_once(attempt)).await?;
        info!("Feed returned {} match(es)", matches.len());
        Ok(matches)
    }
}
