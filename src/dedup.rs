//! Post deduplication policy.
//!
//! A polling cycle re-fetches every subscribed feed, so most of what comes
//! back is already on screen. A [`Deduplicator`] decides which candidates are
//! new by comparing an identity key against the keys known at the start of
//! the cycle.
//!
//! The default [`TitleDeduplicator`] keys on the exact title string: two
//! different posts that share a title (even across feeds) collapse into one.
//! [`IdDeduplicator`] keys on the parser-assigned id instead and can replace
//! it without touching the poller.

use std::collections::HashSet;

use crate::store::Post;

/// Snapshot of the identity keys already present in the post list.
pub type KnownKeys = HashSet<String>;

pub trait Deduplicator: Send + Sync {
    /// Identity key of a post under this policy.
    fn key<'a>(&self, post: &'a Post) -> &'a str;

    /// Collects the keys of `posts`.
    fn known_keys(&self, posts: &[Post]) -> KnownKeys {
        posts.iter().map(|p| self.key(p).to_owned()).collect()
    }

    /// Returns the candidates whose key is not in `known`, in their original
    /// relative order. Pure: same inputs, same output.
    fn filter_new(&self, known: &KnownKeys, candidates: Vec<Post>) -> Vec<Post> {
        candidates
            .into_iter()
            .filter(|p| !known.contains(self.key(p)))
            .collect()
    }
}

/// Exact title match.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleDeduplicator;

impl Deduplicator for TitleDeduplicator {
    fn key<'a>(&self, post: &'a Post) -> &'a str {
        &post.title
    }
}

/// Parser-assigned identifier match.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdDeduplicator;

impl Deduplicator for IdDeduplicator {
    fn key<'a>(&self, post: &'a Post) -> &'a str {
        &post.id
    }
}
