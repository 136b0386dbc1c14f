//! Answers produced without calling the language model.
//!
//! All wall-clock text is rendered in Indian Standard Time.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use parley_core::types::NewsItem;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// `Monday, 19 October 2026`
fn long_date(now: DateTime<Utc>) -> String {
    now.with_timezone(&ist()).format("%A, %d %B %Y").to_string()
}

/// Local date and time answer, e.g.
/// `Aaj ki date Monday, 19 October 2026 hai. Current time 10:05 am (IST) hai.`
pub fn date_time_answer(now: DateTime<Utc>) -> String {
    let time = now.with_timezone(&ist()).format("%I:%M %P");
    format!(
        "Aaj ki date {} hai. Current time {} (IST) hai.",
        long_date(now),
        time
    )
}

/// Render an RFC 2822 publication date as `19 Oct, 10:00 am`.
///
/// Missing dates read `Unknown time`; unparsable ones are shown verbatim.
fn published_label(raw: &str) -> String {
    if raw.is_empty() {
        return "Unknown time".to_string();
    }
    match DateTime::parse_from_rfc2822(raw) {
        Ok(at) => at.with_timezone(&ist()).format("%d %b, %I:%M %P").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Numbered headline digest.
pub fn headline_digest(items: &[NewsItem], now: DateTime<Utc>) -> String {
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let source = if item.source.is_empty() {
                String::new()
            } else {
                format!(" ({})", item.source)
            };
            format!(
                "{}. {}{}\n   Published: {}\n   Link: {}",
                index + 1,
                item.title,
                source,
                published_label(&item.published_at),
                item.link
            )
        })
        .collect();

    format!(
        "Today's date is {} (IST).\n\nLatest headlines:\n{}",
        long_date(now),
        lines.join("\n\n")
    )
}
