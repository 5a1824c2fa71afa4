use bytes::{Bytes, BytesMut};
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::FetchConfig;
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::utils::decompression::{CompressionFormat, DecompressionService};
use crate::utils::url::UrlUtils;

/// reqwest-backed client with bounded timeouts, a body size cap and gzip sniffing
#[derive(Clone)]
pub struct StandardHttpClient {
    client: Client,
    max_body_size: usize,
}

impl StandardHttpClient {
    /// Build a client from the `[fetch]` configuration
    pub fn new(config: &FetchConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::startup(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_body_size: config.max_body_size,
        })
    }

    /// GET `url` and return the (decompressed) body as UTF-8 text
    pub async fn fetch_text(&self, url: &str) -> SourceResult<String> {
        let bytes = self.fetch_bytes(url).await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            SourceError::parse_error("http", format!("Failed to decode content as UTF-8: {e}"))
        })?;
        debug!("Fetched {} characters of text content", content.len());
        Ok(content)
    }

    /// GET `url` and return the raw body, decompressed when it is gzip
    pub async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>> {
        let parsed = UrlUtils::validate_feed_url(url).map_err(|e| SourceError::invalid_url(url, e))?;
        let safe_url = UrlUtils::obfuscate_credentials(url);
        debug!("Fetching {}", safe_url);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(&safe_url, &e))?;

        self.process_response_to_bytes(response, &safe_url).await
    }

    async fn process_response_to_bytes(
        &self,
        mut response: Response,
        url: &str,
    ) -> SourceResult<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!(
                    "{} - URL: {}",
                    status.canonical_reason().unwrap_or("Unknown"),
                    url
                ),
            });
        }

        if let Some(length) = response.content_length()
            && length > self.max_body_size as u64
        {
            return Err(SourceError::PayloadTooLarge {
                url: url.to_string(),
                size: usize::try_from(length).unwrap_or(usize::MAX),
                max_size: self.max_body_size,
            });
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::map_transport_error(url, &e))?
        {
            if body.len() + chunk.len() > self.max_body_size {
                return Err(SourceError::PayloadTooLarge {
                    url: url.to_string(),
                    size: body.len() + chunk.len(),
                    max_size: self.max_body_size,
                });
            }
            body.extend_from_slice(&chunk);
        }
        let bytes: Bytes = body.freeze();
        debug!("Fetched {} bytes of raw content", bytes.len());

        match DecompressionService::detect_compression_format(&bytes) {
            CompressionFormat::Uncompressed => Ok(bytes.to_vec()),
            format => {
                debug!("Content is compressed ({:?}), decompressing", format);
                DecompressionService::decompress(bytes, self.max_body_size)
                    .map_err(|e| SourceError::parse_error("http", e))
            }
        }
    }

    fn map_transport_error(url: &str, error: &reqwest::Error) -> SourceError {
        if error.is_timeout() {
            SourceError::timeout(url)
        } else {
            SourceError::network(url, UrlUtils::obfuscate_credentials(&error.to_string()))
        }
    }
}
