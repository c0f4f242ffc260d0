use feed_rs::parser;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::store::Post;
use crate::util::clean_text;

/// Structured result of parsing one feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub description: String,
    /// Posts in document order
    pub posts: Vec<Post>,
}

/// The content is not an RSS/Atom/JSON feed.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Parse error: {0}")]
    Malformed(String),
}

impl Classify for ParseError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Parsing
    }
}

/// Turns a raw feed document into a [`ParsedFeed`].
///
/// `content` is the body as received; decoding it is the parser's job.
pub trait FeedParser: Send + Sync {
    fn parse(&self, content: &[u8]) -> Result<ParsedFeed, ParseError>;
}

/// [`FeedParser`] backed by `feed-rs` (RSS 0.9x/1.0/2.0, Atom, JSON Feed).
#[derive(Debug, Clone, Copy, Default)]
pub struct SyndicationParser;

impl FeedParser for SyndicationParser {
    fn parse(&self, content: &[u8]) -> Result<ParsedFeed, ParseError> {
        let feed = parser::parse(content).map_err(|e| ParseError::Malformed(e.to_string()))?;

        let title = feed
            .title
            .map(|t| clean_text(&t.content))
            .unwrap_or_default();
        let description = feed
            .description
            .map(|d| clean_text(&d.content))
            .unwrap_or_default();

        let posts = feed
            .entries
            .into_iter()
            .map(|entry| {
                let link = entry.links.first().map(|l| l.href.clone());
                let published = entry.published.or(entry.updated);
                let description = entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body))
                    .map(|d| clean_text(&d));
                let title = entry
                    .title
                    .map(|t| clean_text(&t.content))
                    .unwrap_or_else(|| "Untitled".to_string());

                let existing_id = if entry.id.is_empty() {
                    None
                } else {
                    Some(entry.id.as_str())
                };
                let id = generate_post_id(
                    existing_id,
                    link.as_deref(),
                    &title,
                    published.map(|p| p.timestamp()),
                );

                Post {
                    id,
                    title,
                    link,
                    description,
                    published,
                }
            })
            .collect();

        Ok(ParsedFeed {
            title,
            description,
            posts,
        })
    }
}

/// Uses the entry's own id when it has one, otherwise a hash of the fields
/// that identify it, so the same entry gets the same id on every fetch.
fn generate_post_id(
    existing: Option<&str>,
    link: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(id) = existing {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        link.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
