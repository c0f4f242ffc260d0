//! Shared fixtures: an in-memory fetcher with scripted replies and an RSS builder.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feedwatch::engine::Engine;
use feedwatch::feed::{FetchError, Fetcher};

#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
    Slow(Duration, String),
}

/// Fetcher that answers from a URL → reply table and records every call.
#[derive(Default)]
pub struct FakeFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: String) {
        self.set(url, Reply::Body(body));
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.set(url, Reply::Status(status));
    }

    pub fn serve_slowly(&self, url: &str, delay: Duration, body: String) {
        self.set(url, Reply::Slow(delay, body));
    }

    fn set(&self, url: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let reply = self.replies.lock().unwrap().get(url).cloned();
        match reply {
            Some(Reply::Body(body)) => Ok(body.into_bytes()),
            Some(Reply::Status(status)) => Err(FetchError::HttpStatus(status)),
            Some(Reply::Slow(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body.into_bytes())
            }
            None => Err(FetchError::HttpStatus(404)),
        }
    }
}

/// RSS 2.0 document whose items carry the given titles; guid is derived
/// from the title.
pub fn rss(channel: &str, titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .map(|t| {
            format!(
                "<item><guid>{id}</guid><title>{t}</title><link>https://example.com/{id}</link></item>",
                id = t.to_lowercase().replace(' ', "-")
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{channel}</title><description>{channel} feed</description>{items}</channel></rss>"#
    )
}

pub fn engine_with(fetcher: &Arc<FakeFetcher>) -> Engine {
    Engine::builder(fetcher.clone()).build()
}

pub fn titles(engine: &Engine) -> Vec<String> {
    engine.snapshot().posts.into_iter().map(|p| p.title).collect()
}
