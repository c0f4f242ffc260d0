//! Subscription validation and the subscribe flow.
//!
//! A candidate URL must be a well-formed absolute http(s) URL and must not
//! already be subscribed (exact string match after trimming). A valid URL is
//! fetched and parsed once; only on success is anything registered.

use thiserror::Error;

use crate::error::{Classify, ErrorKind, ErrorStatus};
use crate::feed::{FeedSource, SourceError};
use crate::store::{AlreadySubscribed, Feed, Store};
use crate::util::{validate_url, HostPolicy, UrlValidationError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    Url(#[from] UrlValidationError),
    #[error("Already subscribed: {0}")]
    Duplicate(String),
}

impl From<AlreadySubscribed> for ValidationError {
    fn from(err: AlreadySubscribed) -> Self {
        ValidationError::Duplicate(err.0)
    }
}

impl Classify for ValidationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl Classify for SubscribeError {
    fn kind(&self) -> ErrorKind {
        match self {
            SubscribeError::Validation(e) => e.kind(),
            SubscribeError::Source(e) => e.kind(),
        }
    }
}

/// Checks `candidate` against the URL rules and the current subscriptions.
///
/// Returns the trimmed URL string, which is what gets stored and compared.
pub fn validate_subscription(
    candidate: &str,
    existing: &[String],
    policy: HostPolicy,
) -> Result<String, ValidationError> {
    validate_url(candidate, policy)?;

    let url = candidate.trim();
    if existing.iter().any(|s| s == url) {
        return Err(ValidationError::Duplicate(url.to_string()));
    }
    Ok(url.to_string())
}

/// Validates, loads and registers `raw_url`.
///
/// On failure nothing but the error status changes. On success the error
/// status is cleared.
pub async fn subscribe(
    source: &FeedSource,
    store: &Store,
    policy: HostPolicy,
    raw_url: &str,
) -> Result<Feed, SubscribeError> {
    let result = try_subscribe(source, store, policy, raw_url).await;
    match &result {
        Ok(_) => {
            store.clear_error(&[ErrorKind::Validation, ErrorKind::Transport, ErrorKind::Parsing]);
        }
        Err(e) => {
            tracing::warn!(url = %raw_url.trim(), kind = %e.kind(), error = %e, "Subscribe failed");
            store.set_error(ErrorStatus::from_error(e));
        }
    }
    result
}

async fn try_subscribe(
    source: &FeedSource,
    store: &Store,
    policy: HostPolicy,
    raw_url: &str,
) -> Result<Feed, SubscribeError> {
    let url = validate_subscription(raw_url, &store.subscriptions(), policy)?;
    let parsed = source.load(&url).await?;
    let feed = store
        .add_subscription(&url, parsed)
        .map_err(ValidationError::from)?;
    Ok(feed)
}
