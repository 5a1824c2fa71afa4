//! Source handler trait definitions

use async_trait::async_trait;

use crate::errors::SourceResult;
use crate::models::Feed;

/// Retrieves and parses a remote feed document
///
/// Implementations are stateless per call: one network read, no retries.
/// Every failure (invalid URL, transport, timeout, HTTP status, malformed
/// document) comes back as a [`crate::errors::SourceError`].
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> SourceResult<Feed>;
}
