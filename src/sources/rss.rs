//! HTTP feed source for RSS and Atom documents

use async_trait::async_trait;
use tracing::debug;

use super::traits::FeedSource;
use crate::errors::SourceResult;
use crate::models::Feed;
use crate::utils::feed_parser::parse_feed;
use crate::utils::http_client::StandardHttpClient;
use crate::utils::url::UrlUtils;

/// Fetches feeds over HTTP(S) and parses them with the streaming XML parser
#[derive(Clone)]
pub struct RssFeedSource {
    http_client: StandardHttpClient,
}

impl RssFeedSource {
    pub fn new(http_client: StandardHttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self, url: &str) -> SourceResult<Feed> {
        let content = self.http_client.fetch_text(url).await?;
        let feed = parse_feed(&content)?;
        debug!(
            "Parsed feed '{}' from {} with {} entries",
            feed.title,
            UrlUtils::obfuscate_credentials(url),
            feed.entries.len()
        );
        Ok(feed)
    }
}
