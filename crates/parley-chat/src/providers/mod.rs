//! Live-information adapters.
//!
//! Both adapters absorb every failure and return an empty list, so a
//! flaky search backend can never fail a chat request.

pub mod news;
pub mod web_search;

use std::time::Duration;

use async_trait::async_trait;

use parley_core::types::{NewsItem, SearchResult};

pub use news::GoogleNewsFeed;
pub use web_search::DuckDuckGoSearch;

/// Keyword web search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// At most `limit` results; empty on blank query or any failure.
    async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult>;
}

/// Headline search over a news feed.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// At most `limit` items; empty on any failure.
    async fn search_news(&self, query: &str, limit: usize) -> Vec<NewsItem>;
}

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
