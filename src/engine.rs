//! The feed engine: one store, one feed source, one dedup policy.
//!
//! `subscribe` and `mark_read` are the user-triggered operations; polling is
//! started once with [`Engine::start_polling`] and then driven by its timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::dedup::{Deduplicator, TitleDeduplicator};
use crate::feed::{FeedParser, FeedSource, FetchError, Fetcher, HttpFetcher, SyndicationParser};
use crate::scheduler::{self, CycleError};
use crate::store::{Feed, MarkReadError, Post, State, StateChange, Store};
use crate::subscription::{self, SubscribeError};
use crate::util::HostPolicy;

pub struct Engine {
    source: FeedSource,
    store: Arc<Store>,
    dedup: Arc<dyn Deduplicator>,
    policy: HostPolicy,
    poll_interval: Duration,
}

impl Engine {
    /// Engine over HTTP with the `feed-rs` parser and title deduplication.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config)?;
        Ok(Self::builder(Arc::new(fetcher))
            .host_policy(config.host_policy())
            .poll_interval(config.poll_interval())
            .build())
    }

    pub fn builder(fetcher: Arc<dyn Fetcher>) -> EngineBuilder {
        EngineBuilder {
            fetcher,
            parser: Arc::new(SyndicationParser),
            dedup: Arc::new(TitleDeduplicator),
            policy: HostPolicy::default(),
            poll_interval: Config::default().poll_interval(),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn observe(&self) -> mpsc::UnboundedReceiver<StateChange> {
        self.store.observe()
    }

    pub fn snapshot(&self) -> State {
        self.store.snapshot()
    }

    /// Subscribes to `raw_url`; see [`subscription::subscribe`].
    pub async fn subscribe(&self, raw_url: &str) -> Result<Feed, SubscribeError> {
        subscription::subscribe(&self.source, &self.store, self.policy, raw_url).await
    }

    /// Marks `post_id` as read and makes it the current post.
    pub fn mark_read(&self, post_id: &str) -> Result<Post, MarkReadError> {
        self.store.mark_read(post_id).inspect_err(|e| {
            tracing::debug!(post_id = %post_id, error = %e, "mark_read miss");
        })
    }

    /// Runs a single polling cycle now.
    pub async fn poll_once(&self) -> Result<Vec<Post>, CycleError> {
        scheduler::run_cycle(&self.source, &self.store, self.dedup.as_ref()).await
    }

    /// Starts the recurring poll timer.
    pub fn start_polling(&self) -> JoinHandle<()> {
        tracing::info!(interval_ms = self.poll_interval.as_millis() as u64, "Starting poller");
        scheduler::spawn(
            self.source.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.dedup),
            self.poll_interval,
        )
    }
}

pub struct EngineBuilder {
    fetcher: Arc<dyn Fetcher>,
    parser: Arc<dyn FeedParser>,
    dedup: Arc<dyn Deduplicator>,
    policy: HostPolicy,
    poll_interval: Duration,
}

impl EngineBuilder {
    pub fn parser(mut self, parser: Arc<dyn FeedParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn deduplicator(mut self, dedup: Arc<dyn Deduplicator>) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn host_policy(mut self, policy: HostPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            source: FeedSource::new(self.fetcher, self.parser),
            store: Arc::new(Store::new()),
            dedup: self.dedup,
            policy: self.policy,
            poll_interval: self.poll_interval,
        }
    }
}
