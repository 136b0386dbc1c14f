//! Query classification.
//!
//! Decides whether a message is answered locally (date/time), from the news
//! feed, or by the language model.

use regex::Regex;
use std::sync::LazyLock;

use parley_core::types::FeatureOptions;

// =============================================================================
// Compiled keyword sets
// =============================================================================

static DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(today|date|time|current date|current time|what date|what time)\b")
        .expect("valid date/time regex")
});

static DATE_TIME_HINGLISH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(aaj|taarikh|tarikh|samay|time kya|date kya)\b")
        .expect("valid transliterated date/time regex")
});

static NEWS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(news|headlines|breaking|today news|latest news)\b")
        .expect("valid news regex")
});

static CURRENT_INFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(latest|news|current|today|price|update|search|recent|who is)\b")
        .expect("valid current-info regex")
});

/// How a message will be answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    /// Answered from the local clock, no outbound call.
    DateTime,
    /// Answered from the news feed, falling back to the model when empty.
    News,
    /// Answered by the language model.
    Plain,
}

pub fn is_date_time_query(text: &str) -> bool {
    DATE_TIME_RE.is_match(text) || DATE_TIME_HINGLISH_RE.is_match(text)
}

pub fn is_news_query(text: &str) -> bool {
    NEWS_RE.is_match(text)
}

/// Whether the message likely needs information fresher than the model's training data.
pub fn needs_current_info(text: &str) -> bool {
    CURRENT_INFO_RE.is_match(text)
}

/// Classify a message. Date/time takes priority over news.
///
/// Messages with attachments always go to the model.
pub fn classify(text: &str, features: &FeatureOptions, has_attachments: bool) -> QueryKind {
    if has_attachments {
        return QueryKind::Plain;
    }
    if features.date_grounding && is_date_time_query(text) {
        return QueryKind::DateTime;
    }
    if features.web_search && is_news_query(text) {
        return QueryKind::News;
    }
    QueryKind::Plain
}
