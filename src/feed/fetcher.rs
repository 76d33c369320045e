use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::HttpConfig;

/// Errors that can occur while retrieving a feed.
///
/// Every variant is transient from the caller's point of view: the podcast
/// simply could not be refreshed right now.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URL is not an absolute http(s) URL
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with status >= 400
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Connecting or sending the request exceeded its time budget
    #[error("Request timed out")]
    Timeout,
    /// The server answered successfully with no content
    #[error("Empty response body")]
    EmptyBody,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Retrieves raw feed bytes for a URL.
///
/// Implementations perform a single attempt; retrying is left to whoever
/// schedules the refresh.
pub trait FeedFetcher: Send + Sync {
    /// Fetches the full body of `feed_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the feed could not be retrieved in full.
    fn fetch(&self, feed_url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// [`FeedFetcher`] over HTTP(S) using a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    send_timeout: Duration,
    max_feed_bytes: usize,
}

impl HttpFeedFetcher {
    /// Builds the client with connect/read timeouts and the XML request headers.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the TLS backend or resolver cannot
    /// be initialized.
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/xml"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("podsync/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            // send() covers connecting and writing the request
            send_timeout: config.connect_timeout() + config.write_timeout(),
            max_feed_bytes: config.max_feed_bytes,
        })
    }

    async fn fetch_bytes(&self, feed_url: &str) -> Result<Vec<u8>, FetchError> {
        let url = validate_feed_url(feed_url)?;

        tracing::debug!(feed = %url, "Fetching feed");

        let response = tokio::time::timeout(self.send_timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, self.max_feed_bytes).await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(bytes)
    }
}

impl FeedFetcher for HttpFeedFetcher {
    /// One GET with the configured timeouts and size limit. Failures are
    /// logged at warn level before being returned.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - Not an absolute http(s) URL
    /// - [`FetchError::Network`] - Connection, TLS or body read errors
    /// - [`FetchError::Timeout`] - Connect or send exceeded its budget
    /// - [`FetchError::HttpStatus`] - Status 400 or above
    /// - [`FetchError::EmptyBody`] - Success status with no content
    /// - [`FetchError::ResponseTooLarge`] - Body over `max_feed_bytes`
    /// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
    async fn fetch(&self, feed_url: &str) -> Result<Vec<u8>, FetchError> {
        let result = self.fetch_bytes(feed_url).await;
        if let Err(e) = &result {
            tracing::warn!(feed = %feed_url, error = %e, "Feed fetch failed");
        }
        result
    }
}

/// Accepts only absolute `http`/`https` URLs.
fn validate_feed_url(feed_url: &str) -> Result<url::Url, FetchError> {
    let url =
        url::Url::parse(feed_url.trim()).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FetchError::InvalidUrl(format!(
            "unsupported scheme: {scheme}"
        ))),
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: Network interruptions can end the stream early
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
