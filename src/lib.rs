//! Feed subscription and polling engine.
//!
//! Subscribe to RSS/Atom feeds by URL, then keep an aggregated, newest-first
//! post list current by re-fetching every subscription on a fixed interval
//! and merging only posts that have not been seen before.
//!
//! ```ignore
//! use feedwatch::{config::Config, engine::Engine};
//!
//! let engine = Engine::new(&Config::default())?;
//! engine.subscribe("https://example.com/feed.xml").await?;
//! let poller = engine.start_polling();
//! ```

pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod feed;
pub mod scheduler;
pub mod store;
pub mod subscription;
pub mod util;
