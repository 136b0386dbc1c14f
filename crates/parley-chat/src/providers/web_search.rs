//! DuckDuckGo instant-answer search.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use parley_core::types::SearchResult;

use super::{build_client, WebSearch};

const FALLBACK_TITLE: &str = "Result";

/// Web search backed by the DuckDuckGo instant-answer API.
#[derive(Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            endpoint: endpoint.into(),
        }
    }

    async fn fetch(&self, query: &str) -> Result<InstantAnswer, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
                ("no_redirect", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self.fetch(query).await {
            Ok(answer) => {
                let results = answer.into_results(limit);
                debug!(query, count = results.len(), "Web search completed");
                results
            }
            Err(e) => {
                warn!(query, error = %e, "Web search failed");
                Vec::new()
            }
        }
    }
}

// =============================================================================
// Response model
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: Option<String>,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: Option<String>,
    #[serde(rename = "Heading", default)]
    heading: Option<String>,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Option<Vec<Topic>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Topic {
    #[serde(rename = "Text", default)]
    text: Option<String>,
    #[serde(rename = "FirstURL", default)]
    first_url: Option<String>,
    #[serde(rename = "Topics", default)]
    topics: Option<Vec<Topic>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Replace every topic group by its members, depth-first.
fn flatten_topics(topics: Vec<Topic>, out: &mut Vec<Topic>) {
    for mut topic in topics {
        match topic.topics.take() {
            Some(children) if !children.is_empty() => flatten_topics(children, out),
            _ => out.push(topic),
        }
    }
}

/// Split `"Title - snippet"` at the first separator.
fn split_topic_text(text: &str) -> (String, String) {
    let (title, snippet) = match text.find(" - ") {
        Some(idx) => (text[..idx].trim(), text[idx + 3..].trim()),
        None => (FALLBACK_TITLE, text.trim()),
    };
    let title = if title.is_empty() { FALLBACK_TITLE } else { title };
    (title.to_string(), snippet.to_string())
}

impl InstantAnswer {
    pub(crate) fn into_results(self, limit: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if let (Some(snippet), Some(url)) = (non_empty(self.abstract_text), non_empty(self.abstract_url)) {
            results.push(SearchResult {
                title: non_empty(self.heading).unwrap_or_else(|| FALLBACK_TITLE.to_string()),
                snippet,
                url,
            });
        }

        let mut related = Vec::new();
        flatten_topics(self.related_topics.unwrap_or_default(), &mut related);

        for topic in related {
            if results.len() >= limit {
                break;
            }
            let (Some(text), Some(url)) = (non_empty(topic.text), non_empty(topic.first_url)) else {
                continue;
            };
            let (title, snippet) = split_topic_text(&text);
            results.push(SearchResult { title, snippet, url });
        }

        results.truncate(limit);
        results
    }
}
