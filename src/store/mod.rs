//! In-memory state store.
//!
//! Holds subscriptions, feeds, the aggregate post list, read markers and the
//! current error status. All mutation goes through the methods below; each
//! one applies its change and notifies observers under a single lock, so
//! interleaved subscription flows and polling cycles never see a
//! half-applied merge.

mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::dedup::{Deduplicator, KnownKeys};
use crate::error::{ErrorKind, ErrorStatus};
use crate::feed::ParsedFeed;

pub use types::{Feed, FeedId, Post, State, StateChange};

/// Commit-time rejection of a subscription whose URL is already present.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Already subscribed: {0}")]
pub struct AlreadySubscribed(pub String);

/// `mark_read` was given an id that is not in the aggregate post list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkReadError {
    #[error("Post not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Default)]
pub struct Store {
    state: Mutex<State>,
    observers: Mutex<Vec<mpsc::UnboundedSender<StateChange>>>,
    next_feed_id: AtomicU64,
    /// Sequence number of the most recently started polling cycle.
    cycle_seq: AtomicU64,
    /// Cycle sequence the current error was recorded at. Only read or
    /// written while holding the state lock.
    error_seq: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Registers an observer. Every later mutation is delivered on the
    /// returned channel; dropping the receiver unregisters it.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.observers).push(tx);
        rx
    }

    /// Delivers `changes` to every live observer. Callers hold the state
    /// lock so deliveries follow mutation order.
    fn notify(&self, changes: Vec<StateChange>) {
        if changes.is_empty() {
            return;
        }
        let mut observers = lock(&self.observers);
        observers.retain(|tx| changes.iter().all(|c| tx.send(c.clone()).is_ok()));
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Clone of the full state.
    pub fn snapshot(&self) -> State {
        lock(&self.state).clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.state).subscriptions.clone()
    }

    pub fn feeds(&self) -> Vec<Feed> {
        lock(&self.state).feeds.clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        lock(&self.state).posts.clone()
    }

    pub fn read_post_ids(&self) -> Vec<String> {
        lock(&self.state).read_post_ids.clone()
    }

    pub fn current_post(&self) -> Option<Post> {
        lock(&self.state).current_post.clone()
    }

    pub fn error(&self) -> Option<ErrorStatus> {
        lock(&self.state).error.clone()
    }

    pub fn is_read(&self, post_id: &str) -> bool {
        lock(&self.state).read_post_ids.iter().any(|id| id == post_id)
    }

    /// Keys of every post currently in the aggregate list.
    pub fn known_keys(&self, dedup: &dyn Deduplicator) -> KnownKeys {
        dedup.known_keys(&lock(&self.state).posts)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Registers a freshly loaded feed under `url`.
    ///
    /// The feed gets a new id and is prepended to the feed list, its posts
    /// are prepended to the aggregate list as-is, and `url` is appended to
    /// the subscription set. Fails without touching anything if `url` was
    /// subscribed by a concurrent flow since it was validated.
    pub fn add_subscription(&self, url: &str, parsed: ParsedFeed) -> Result<Feed, AlreadySubscribed> {
        let mut state = lock(&self.state);
        if state.subscriptions.iter().any(|s| s == url) {
            return Err(AlreadySubscribed(url.to_string()));
        }

        let feed = Feed {
            id: FeedId(self.next_feed_id.fetch_add(1, Ordering::Relaxed) + 1),
            title: parsed.title,
            description: parsed.description,
            url: url.to_string(),
        };

        state.feeds.insert(0, feed.clone());
        state.posts.splice(0..0, parsed.posts.iter().cloned());
        state.subscriptions.push(url.to_string());

        tracing::info!(
            feed_id = %feed.id,
            url = %url,
            posts = parsed.posts.len(),
            "Subscribed to feed"
        );

        self.notify(vec![
            StateChange::FeedAdded(feed.clone()),
            StateChange::PostsAdded(parsed.posts),
            StateChange::SubscriptionAdded {
                url: url.to_string(),
            },
        ]);

        Ok(feed)
    }

    /// Prepends `posts` to the aggregate list in one step.
    ///
    /// Each candidate is checked again against the live list (and against
    /// earlier candidates in the same batch) under the lock, so overlapping
    /// cycles that both saw a post as new insert it only once. Returns the
    /// posts actually added.
    pub fn merge_posts(&self, dedup: &dyn Deduplicator, posts: Vec<Post>) -> Vec<Post> {
        if posts.is_empty() {
            return Vec::new();
        }

        let mut state = lock(&self.state);
        let mut seen = dedup.known_keys(&state.posts);
        let added: Vec<Post> = posts
            .into_iter()
            .filter(|p| seen.insert(dedup.key(p).to_owned()))
            .collect();

        if !added.is_empty() {
            state.posts.splice(0..0, added.iter().cloned());
            self.notify(vec![StateChange::PostsAdded(added.clone())]);
        }
        added
    }

    /// Records that the user opened `post_id` and makes it the current post.
    ///
    /// The id is prepended to the read-marker set the first time only.
    /// Unknown ids are reported as [`MarkReadError::NotFound`] and change
    /// nothing.
    pub fn mark_read(&self, post_id: &str) -> Result<Post, MarkReadError> {
        let mut state = lock(&self.state);
        let post = state
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
            .ok_or_else(|| MarkReadError::NotFound(post_id.to_string()))?;

        let first_time = !state.read_post_ids.iter().any(|id| id == post_id);
        if first_time {
            state.read_post_ids.insert(0, post.id.clone());
        }
        state.current_post = Some(post.clone());

        self.notify(vec![StateChange::PostOpened {
            post: post.clone(),
            first_time,
        }]);
        Ok(post)
    }

    /// Allocates the sequence number for a polling cycle that is about to
    /// start. Numbers increase in start order.
    pub fn begin_cycle(&self) -> u64 {
        self.cycle_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replaces the error status.
    ///
    /// Cycles already in flight count as older than this error and cannot
    /// clear it through [`Store::clear_error_if_newer`].
    pub fn set_error(&self, status: ErrorStatus) {
        let mut state = lock(&self.state);
        self.error_seq
            .store(self.cycle_seq.load(Ordering::SeqCst), Ordering::SeqCst);
        state.error = Some(status.clone());
        self.notify(vec![StateChange::ErrorChanged(Some(status))]);
    }

    /// Replaces the error status with the failure of polling cycle `seq`.
    pub fn set_cycle_error(&self, seq: u64, status: ErrorStatus) {
        let mut state = lock(&self.state);
        self.error_seq.store(seq, Ordering::SeqCst);
        state.error = Some(status.clone());
        self.notify(vec![StateChange::ErrorChanged(Some(status))]);
    }

    /// Clears the error status if its kind is one of `kinds`. Returns
    /// whether anything was cleared.
    pub fn clear_error(&self, kinds: &[ErrorKind]) -> bool {
        let mut state = lock(&self.state);
        let cleared = matches!(&state.error, Some(status) if kinds.contains(&status.kind));
        if cleared {
            state.error = None;
            self.notify(vec![StateChange::ErrorChanged(None)]);
        }
        cleared
    }

    /// Like [`Store::clear_error`], but only on behalf of a polling cycle
    /// that started after the current error was recorded. A slow cycle that
    /// finishes late leaves errors from newer cycles alone.
    pub fn clear_error_if_newer(&self, seq: u64, kinds: &[ErrorKind]) -> bool {
        let mut state = lock(&self.state);
        let cleared = seq > self.error_seq.load(Ordering::SeqCst)
            && matches!(&state.error, Some(status) if kinds.contains(&status.kind));
        if cleared {
            state.error = None;
            self.notify(vec![StateChange::ErrorChanged(None)]);
        }
        cleared
    }
}

/// Locks `m`, recovering the data if a previous holder panicked. Every
/// critical section above leaves the state consistent before it can panic.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::TitleDeduplicator;
    use pretty_assertions::assert_eq;

    fn post(id: &str, title: &str) -> Post {
        Post {
            id: id.to_string(),
            title: title.to_string(),
            link: Some(format!("https://example.com/{id}")),
            description: None,
            published: None,
        }
    }

    fn parsed(title: &str, posts: Vec<Post>) -> ParsedFeed {
        ParsedFeed {
            title: title.to_string(),
            description: format!("{title} description"),
            posts,
        }
    }

    fn titles(store: &Store) -> Vec<String> {
        store.posts().into_iter().map(|p| p.title).collect()
    }

    #[test]
    fn test_add_subscription_prepends_feed_and_posts() {
        let store = Store::new();
        store
            .add_subscription("https://a.example/rss", parsed("A", vec![post("a1", "A1")]))
            .unwrap();
        let feed_b = store
            .add_subscription(
                "https://b.example/rss",
                parsed("B", vec![post("b1", "B1"), post("b2", "B2")]),
            )
            .unwrap();

        assert_eq!(titles(&store), vec!["B1", "B2", "A1"]);
        let feeds = store.feeds();
        assert_eq!(feeds[0], feed_b);
        assert_eq!(feeds[1].title, "A");
        assert_eq!(
            store.subscriptions(),
            vec!["https://a.example/rss", "https://b.example/rss"]
        );
    }

    #[test]
    fn test_feed_ids_are_unique() {
        let store = Store::new();
        let a = store.add_subscription("https://a.example/rss", parsed("Same", vec![])).unwrap();
        let b = store.add_subscription("https://b.example/rss", parsed("Same", vec![])).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_add_subscription_rejects_duplicate_without_changes() {
        let store = Store::new();
        store
            .add_subscription("https://a.example/rss", parsed("A", vec![post("1", "P1")]))
            .unwrap();

        let err = store
            .add_subscription("https://a.example/rss", parsed("A", vec![post("9", "P9")]))
            .unwrap_err();
        assert_eq!(err, AlreadySubscribed("https://a.example/rss".into()));
        assert_eq!(titles(&store), vec!["P1"]);
        assert_eq!(store.feeds().len(), 1);
    }

    #[test]
    fn test_merge_prepends_in_batch_order() {
        let store = Store::new();
        store
            .add_subscription("https://a.example/rss", parsed("A", vec![post("1", "P1"), post("2", "P2")]))
            .unwrap();

        let added = store.merge_posts(&TitleDeduplicator, vec![post("3", "P3"), post("4", "P4")]);
        assert_eq!(added.len(), 2);
        assert_eq!(titles(&store), vec!["P3", "P4", "P1", "P2"]);
    }

    #[test]
    fn test_merge_skips_posts_added_since_snapshot() {
        let store = Store::new();
        store.merge_posts(&TitleDeduplicator, vec![post("3", "P3")]);

        // A second, overlapping cycle computed P3 as new from an older snapshot
        let added = store.merge_posts(&TitleDeduplicator, vec![post("3", "P3"), post("4", "P4")]);
        assert_eq!(added, vec![post("4", "P4")]);
        assert_eq!(titles(&store), vec!["P4", "P3"]);
    }

    #[test]
    fn test_merge_collapses_duplicates_within_batch() {
        let store = Store::new();
        let added = store.merge_posts(&TitleDeduplicator, vec![post("a", "Same"), post("b", "Same")]);
        assert_eq!(added, vec![post("a", "Same")]);
    }

    #[test]
    fn test_mark_read_records_once_and_tracks_current() {
        let store = Store::new();
        store
            .add_subscription("https://a.example/rss", parsed("A", vec![post("1", "P1"), post("2", "P2")]))
            .unwrap();

        store.mark_read("1").unwrap();
        store.mark_read("2").unwrap();
        store.mark_read("1").unwrap();

        assert_eq!(store.read_post_ids(), vec!["2", "1"]);
        assert_eq!(store.current_post().map(|p| p.id), Some("1".to_string()));
        assert!(store.is_read("1"));
        assert!(!store.is_read("3"));
    }

    #[test]
    fn test_mark_read_unknown_id_is_not_found() {
        let store = Store::new();
        let err = store.mark_read("missing").unwrap_err();
        assert_eq!(err, MarkReadError::NotFound("missing".into()));
        assert!(store.read_post_ids().is_empty());
        assert!(store.current_post().is_none());
    }

    #[test]
    fn test_clear_error_only_matching_kinds() {
        let store = Store::new();
        store.set_error(ErrorStatus::new(ErrorKind::Validation, "bad url"));

        assert!(!store.clear_error(&[ErrorKind::Transport, ErrorKind::Parsing]));
        assert_eq!(store.error().map(|e| e.kind), Some(ErrorKind::Validation));

        assert!(store.clear_error(&[ErrorKind::Validation]));
        assert!(store.error().is_none());
    }

    #[test]
    fn test_older_cycle_cannot_clear_newer_cycle_error() {
        let store = Store::new();
        let slow = store.begin_cycle();
        let failed = store.begin_cycle();
        assert!(failed > slow);

        store.set_cycle_error(failed, ErrorStatus::new(ErrorKind::Transport, "503"));
        assert!(!store.clear_error_if_newer(slow, &[ErrorKind::Transport]));
        assert_eq!(store.error().map(|e| e.kind), Some(ErrorKind::Transport));

        let next = store.begin_cycle();
        assert!(store.clear_error_if_newer(next, &[ErrorKind::Transport]));
        assert!(store.error().is_none());
    }

    #[test]
    fn test_in_flight_cycle_cannot_clear_later_error() {
        let store = Store::new();
        let in_flight = store.begin_cycle();
        store.set_error(ErrorStatus::new(ErrorKind::Parsing, "not a feed"));

        assert!(!store.clear_error_if_newer(in_flight, &[ErrorKind::Parsing]));
        assert!(store.clear_error_if_newer(store.begin_cycle(), &[ErrorKind::Parsing]));
    }

    #[tokio::test]
    async fn test_observer_sees_changes_in_order() {
        let store = Store::new();
        let mut rx = store.observe();

        store
            .add_subscription("https://a.example/rss", parsed("A", vec![post("1", "P1")]))
            .unwrap();
        store.mark_read("1").unwrap();

        assert!(matches!(rx.recv().await, Some(StateChange::FeedAdded(f)) if f.title == "A"));
        assert!(matches!(rx.recv().await, Some(StateChange::PostsAdded(p)) if p.len() == 1));
        assert!(matches!(
            rx.recv().await,
            Some(StateChange::SubscriptionAdded { url }) if url == "https://a.example/rss"
        ));
        assert!(matches!(
            rx.recv().await,
            Some(StateChange::PostOpened { first_time: true, .. })
        ));
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let store = Store::new();
        drop(store.observe());
        store.set_error(ErrorStatus::new(ErrorKind::Transport, "down"));
        assert!(lock(&store.observers).is_empty());
    }
}
