use async_trait::async_trait;

use super::FetchError;
use crate::db::models::Match;

/// Source of full match snapshots.
#[async_trait]
pub trait MatchFeed: Send + Sync {
    /// Fetch the current snapshot, already unwrapped into records.
    async fn fetch_snapshot(&self) -> Result<Vec<Match>, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
