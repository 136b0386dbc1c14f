//! Google News RSS headline search.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use parley_core::types::NewsItem;

use super::{build_client, NewsFeed};

const DEFAULT_QUERY: &str = "latest news";

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<item>.*?</item>").expect("valid item regex"));

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("valid title regex"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link>(.*?)</link>").expect("valid link regex"));

static PUB_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pubDate>(.*?)</pubDate>").expect("valid pubDate regex"));

static CDATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid CDATA regex"));

/// News search backed by a Google-News-style RSS endpoint.
#[derive(Clone)]
pub struct GoogleNewsFeed {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleNewsFeed {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            endpoint: endpoint.into(),
        }
    }

    async fn fetch(&self, query: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/xml, text/xml",
            )
            .query(&[("q", query), ("hl", "en-IN"), ("gl", "IN"), ("ceid", "IN:en")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl NewsFeed for GoogleNewsFeed {
    async fn search_news(&self, query: &str, limit: usize) -> Vec<NewsItem> {
        let query = match query.trim() {
            "" => DEFAULT_QUERY,
            q => q,
        };

        match self.fetch(query).await {
            Ok(xml) => {
                let items = parse_feed(&xml, limit);
                debug!(query, count = items.len(), "News search completed");
                items
            }
            Err(e) => {
                warn!(query, error = %e, "News search failed");
                Vec::new()
            }
        }
    }
}

// =============================================================================
// RSS extraction
// =============================================================================

/// Extract up to `limit` items from an RSS document.
///
/// Items without a title or link are dropped after the limit is applied.
pub fn parse_feed(xml: &str, limit: usize) -> Vec<NewsItem> {
    ITEM_RE
        .find_iter(xml)
        .take(limit)
        .filter_map(|block| {
            let block = block.as_str();
            let title = extract_tag(block, &TITLE_RE);
            let link = extract_tag(block, &LINK_RE);
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(NewsItem {
                source: extract_source(&title),
                published_at: extract_tag(block, &PUB_DATE_RE),
                title,
                link,
            })
        })
        .collect()
}

/// First capture of `re` in `block`, CDATA unwrapped and entities decoded.
fn extract_tag(block: &str, re: &Regex) -> String {
    re.captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_xml(&CDATA_RE.replace_all(m.as_str(), "$1")))
        .unwrap_or_default()
}

fn decode_xml(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

/// Publisher name from a `"Headline - Publisher"` title.
fn extract_source(title: &str) -> String {
    match title.rsplit_once(" - ") {
        Some((_, source)) => source.trim().to_string(),
        None => String::new(),
    }
}
