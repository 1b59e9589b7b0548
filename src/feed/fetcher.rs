use crate::feed::parser::{parse_feed, FeedDocument};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed.
///
/// Everything except [`FetchError::Decode`] is a network-class failure.
/// The poller treats both classes the same way: skip the feed this tick and
/// let the rotation bring it back later.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request plus body exceeded the fetch timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body is not a well-formed RSS document
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Coarse class for structured logs: `"network"` or `"decode"`
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Decode(_) => "decode",
            _ => "network",
        }
    }
}

/// Build the HTTP client used for every feed request.
///
/// `user_agent` is sent on each request so feed hosts can identify the poller.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .pool_idle_timeout(Duration::from_secs(30)) // Close idle connections promptly
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

/// Fetch and parse one feed.
///
/// Issues exactly one GET; there are no retries. The whole exchange
/// (connect, headers, body) must finish within `timeout`.
///
/// # Errors
///
/// - [`FetchError::Timeout`] - `timeout` elapsed
/// - [`FetchError::Network`] - connection or TLS errors
/// - [`FetchError::HttpStatus`] - non-2xx response
/// - [`FetchError::ResponseTooLarge`] - body over 10MB
/// - [`FetchError::IncompleteResponse`] - body shorter than Content-Length
/// - [`FetchError::Decode`] - malformed XML, a non-UTF-8 body, or not an RSS document
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<FeedDocument, FetchError> {
    let bytes = tokio::time::timeout(timeout, fetch_bytes(client, url))
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;

    parse_feed(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
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

    // EDGE-005: a dropped connection mid-body can end the stream early
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
