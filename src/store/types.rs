use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::ErrorStatus;

// ============================================================================
// Identifiers
// ============================================================================

/// Process-unique feed identifier, handed out by the [`Store`](super::Store)
/// when a subscription is registered. Unrelated to feed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedId(pub u64);

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A subscribed feed. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: FeedId,
    pub title: String,
    pub description: String,
    /// Subscription URL this feed was loaded from
    pub url: String,
}

/// A single feed item as produced by the parser.
///
/// `id` comes from the feed content (entry id, or a content hash when the
/// entry has none). Read state is not stored here; see
/// [`Store::is_read`](super::Store::is_read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Everything the store holds.
///
/// `feeds` and `posts` are newest-first. `read_post_ids` holds identifiers
/// only, most recently opened first.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub subscriptions: Vec<String>,
    pub feeds: Vec<Feed>,
    pub posts: Vec<Post>,
    pub read_post_ids: Vec<String>,
    pub current_post: Option<Post>,
    pub error: Option<ErrorStatus>,
}

// ============================================================================
// Change Notifications
// ============================================================================

/// A mutation observed on the store, delivered to every observer in the
/// order the mutations were applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// A URL joined the subscription set.
    SubscriptionAdded { url: String },
    /// A feed was registered (prepended to the feed list).
    FeedAdded(Feed),
    /// Posts were prepended to the aggregate list, in display order.
    PostsAdded(Vec<Post>),
    /// The user opened a post. `first_time` is false when the id was
    /// already in the read-marker set.
    PostOpened { post: Post, first_time: bool },
    /// The error status was set or cleared.
    ErrorChanged(Option<ErrorStatus>),
}
