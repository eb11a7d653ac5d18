use crate::types::{Result, Tweet};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for pulling a user's timeline from an upstream API.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Fetch up to `count` of the most recent items posted by `screenname`.
    /// Failures carry the upstream's error payload in `AggregatorError::Upstream`.
    ///
    /// The whole call, retries included, should finish within `budget`; once it
    /// is spent the last upstream error is returned.
    async fn user_timeline(
        &self,
        screenname: &str,
        count: u32,
        include_rts: bool,
        budget: Duration,
    ) -> Result<Vec<Tweet>>;
}
