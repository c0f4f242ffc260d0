//! Feed retrieval and parsing.
//!
//! - [`fetcher`] - one network retrieval per call, direct or through a CORS relay
//! - [`parser`] - RSS/Atom text to a [`ParsedFeed`] using `feed-rs`
//!
//! [`FeedSource`] composes the two into the single step the subscription
//! flow and the poller both use, keeping the two failure kinds apart.

mod fetcher;
mod parser;

use std::sync::Arc;

use thiserror::Error;

use crate::error::{Classify, ErrorKind};

pub use fetcher::{FetchError, Fetcher, HttpFetcher};
pub use parser::{FeedParser, ParseError, ParsedFeed, SyndicationParser};

/// Failure of a fetch-then-parse step.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error(transparent)]
    Parsing(#[from] ParseError),
}

impl Classify for SourceError {
    fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Transport(e) => e.kind(),
            SourceError::Parsing(e) => e.kind(),
        }
    }
}

/// A [`Fetcher`] paired with a [`FeedParser`].
#[derive(Clone)]
pub struct FeedSource {
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn FeedParser>,
}

impl FeedSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, parser: Arc<dyn FeedParser>) -> Self {
        Self { fetcher, parser }
    }

    /// Fetches `url` and parses the result.
    pub async fn load(&self, url: &str) -> Result<ParsedFeed, SourceError> {
        let body = self.fetcher.fetch(url).await?;
        let feed = self.parser.parse(&body)?;
        tracing::debug!(feed = %url, posts = feed.posts.len(), "Loaded feed");
        Ok(feed)
    }
}
