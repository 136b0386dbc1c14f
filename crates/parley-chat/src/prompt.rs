//! Prompt augmentation.
//!
//! Wraps the user's question with optional date grounding, a code-mode
//! preamble, and live web search context.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use parley_core::types::{FeatureOptions, SearchResult};

use crate::classifier::needs_current_info;
use crate::providers::WebSearch;

const CODE_MODE_BLOCK: &str = "Code mode is ON. Give practical, correct code-focused answers. \
Use short explanation + clean code blocks. Mention assumptions when needed.";

const SEARCH_HEADER: &str =
    "Web search context (use when relevant, do not fabricate beyond these):";

/// Builds the final prompt for the last user turn.
#[derive(Clone)]
pub struct PromptAugmenter {
    search: Arc<dyn WebSearch>,
    result_limit: usize,
}

impl PromptAugmenter {
    pub fn new(search: Arc<dyn WebSearch>, result_limit: usize) -> Self {
        Self {
            search,
            result_limit,
        }
    }

    /// Compose the prompt, running at most one web search.
    ///
    /// Search runs only when web search is enabled and the content looks
    /// like it needs current information.
    pub async fn build(&self, content: &str, features: &FeatureOptions, now: DateTime<Utc>) -> String {
        let results = if features.web_search && needs_current_info(content) {
            self.search.search(content, self.result_limit).await
        } else {
            Vec::new()
        };
        compose_prompt(content, features, now, &results)
    }
}

/// Join the enabled prompt blocks with blank lines. The question is always last.
pub fn compose_prompt(
    content: &str,
    features: &FeatureOptions,
    now: DateTime<Utc>,
    results: &[SearchResult],
) -> String {
    let mut blocks = Vec::with_capacity(4);

    if features.date_grounding {
        blocks.push(format!(
            "Current date/time: {}. This is authoritative. Never claim a different date or year.",
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
    }

    if features.code_mode {
        blocks.push(CODE_MODE_BLOCK.to_string());
    }

    if !results.is_empty() {
        let entries: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(index, r)| {
                format!("{}. {}\nSnippet: {}\nURL: {}", index + 1, r.title, r.snippet, r.url)
            })
            .collect();
        blocks.push(format!("{}\n{}", SEARCH_HEADER, entries.join("\n\n")));
    }

    blocks.push(format!("User question:\n{}", content));
    blocks.join("\n\n")
}
