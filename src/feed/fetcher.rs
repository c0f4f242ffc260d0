use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::Policy;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::error::{Classify, ErrorKind};

/// Errors that can occur while retrieving feed content.
///
/// All of them are transport failures from the user's point of view: the
/// feed could not be read, as opposed to read but not understood.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The relay answered but did not hand back the feed body
    #[error("Relay error: {0}")]
    Relay(String),
    /// The configured relay base URL is unusable
    #[error("Invalid relay URL: {0}")]
    InvalidRelayUrl(#[from] url::ParseError),
}

impl Classify for FetchError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}

/// One network retrieval of a feed's raw bytes.
///
/// Implementations do not decode or interpret the content and do not retry.
/// Character set detection is left to the parser, which reads the XML
/// encoding declaration.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// JSON envelope returned by an allorigins-style CORS relay.
#[derive(Debug, Deserialize)]
struct RelayResponse {
    contents: Option<String>,
}

/// [`Fetcher`] over HTTP(S) with `reqwest`.
///
/// Either requests the feed URL directly, or, when a relay is configured,
/// requests `<relay>?disableCache=true&url=<feed url>` and unwraps the
/// `contents` field of the JSON reply.
///
/// No request timeout is set: a slow fetch is allowed to outlive the poll
/// interval and is never cancelled by the next tick.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    relay: Option<Url>,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(create_redirect_policy())
            .build()?;
        let relay = config.relay_url.as_deref().map(Url::parse).transpose()?;
        Ok(Self::with_client(client, relay, config.max_feed_bytes))
    }

    pub fn with_client(client: reqwest::Client, relay: Option<Url>, max_bytes: usize) -> Self {
        Self {
            client,
            relay,
            max_bytes,
        }
    }
}

/// Builds the relay request URL for `feed_url`.
fn relay_url(relay: &Url, feed_url: &str) -> Url {
    let mut url = relay.clone();
    url.query_pairs_mut()
        .append_pair("disableCache", "true")
        .append_pair("url", feed_url);
    url
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(feed = %url, relayed = self.relay.is_some(), "Fetching feed");

        let request = match &self.relay {
            Some(relay) => self.client.get(relay_url(relay, url)),
            None => self.client.get(url),
        };
        let response = request.send().await?;

        // Non-2xx responses fail immediately
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, self.max_bytes).await?;

        if self.relay.is_none() {
            return Ok(bytes);
        }

        let envelope: RelayResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Relay(e.to_string()))?;
        envelope
            .contents
            .map(String::into_bytes)
            .ok_or_else(|| FetchError::Relay("response has no contents".to_string()))
    }
}

/// Create a redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 5 {
            return attempt.error("Too many redirects (max 5)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

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
