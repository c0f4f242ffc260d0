//! Background polling.
//!
//! Every tick snapshots the subscription list and the known post keys, then
//! fetches and parses each subscribed feed one after another. A failure on
//! any feed ends the cycle: nothing from it is merged and the error is
//! recorded. On success the collected posts are deduplicated against the
//! snapshot and prepended to the post list in a single store call.
//!
//! Ticks run on a fixed period measured from when each one fired, not from
//! when its cycle finished. Each cycle runs as its own task, so a cycle that
//! outlives the period overlaps the next one; [`Store::merge_posts`] keeps
//! that safe. Cycles are numbered in tick order, and a late-finishing
//! success never clears an error recorded by a newer cycle.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, TryStreamExt};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::dedup::Deduplicator;
use crate::error::{Classify, ErrorKind, ErrorStatus};
use crate::feed::{FeedSource, SourceError};
use crate::store::{Post, Store};

/// A polling cycle stopped at `url`.
#[derive(Debug, Error)]
#[error("{url}: {source}")]
pub struct CycleError {
    pub url: String,
    #[source]
    pub source: SourceError,
}

impl Classify for CycleError {
    fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Runs one polling cycle and returns the posts it added.
pub async fn run_cycle(
    source: &FeedSource,
    store: &Store,
    dedup: &dyn Deduplicator,
) -> Result<Vec<Post>, CycleError> {
    let seq = store.begin_cycle();
    run_sequenced(seq, source, store, dedup).await
}

/// Runs cycle number `seq`. The number decides whether a success may clear
/// the current error: only an error recorded before this cycle started is
/// cleared.
async fn run_sequenced(
    seq: u64,
    source: &FeedSource,
    store: &Store,
    dedup: &dyn Deduplicator,
) -> Result<Vec<Post>, CycleError> {
    tracing::debug!(cycle = seq, "Polling cycle started");
    let urls = store.subscriptions();
    if urls.is_empty() {
        return Ok(Vec::new());
    }
    let known = store.known_keys(dedup);

    // Sequential fold: feed N+1 is not requested until feed N has parsed
    let fetched = stream::iter(urls.into_iter().map(Ok::<_, CycleError>))
        .try_fold(Vec::new(), |mut acc, url: String| async move {
            match source.load(&url).await {
                Ok(feed) => {
                    acc.extend(feed.posts);
                    Ok(acc)
                }
                Err(err) => Err(CycleError { url, source: err }),
            }
        })
        .await;

    let fetched = match fetched {
        Ok(posts) => posts,
        Err(e) => {
            tracing::warn!(cycle = seq, feed = %e.url, kind = %e.kind(), error = %e.source, "Polling cycle failed");
            store.set_cycle_error(seq, ErrorStatus::from_error(&e));
            return Err(e);
        }
    };

    let fresh = dedup.filter_new(&known, fetched);
    let added = store.merge_posts(dedup, fresh);
    store.clear_error_if_newer(seq, &[ErrorKind::Transport, ErrorKind::Parsing]);

    if !added.is_empty() {
        tracing::info!(cycle = seq, new_posts = added.len(), "Merged new posts");
    }
    Ok(added)
}

/// Starts the polling loop. The first cycle begins one `period` from now.
///
/// The loop never ends on its own; abort the returned handle to stop it.
pub fn spawn(
    source: FeedSource,
    store: Arc<Store>,
    dedup: Arc<dyn Deduplicator>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // Numbered here, not in the task, so numbers follow tick order
            let seq = store.begin_cycle();

            let source = source.clone();
            let store = Arc::clone(&store);
            let dedup = Arc::clone(&dedup);
            tokio::spawn(async move {
                // Failures are already recorded in the store
                let _ = run_sequenced(seq, &source, &store, dedup.as_ref()).await;
                tracing::debug!(cycle = seq, "Polling cycle finished");
            });
        }
    })
}
