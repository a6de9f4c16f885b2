//! Output formatting utilities.

use changefeed::ChangeFeedEvent;
use serde_json::Value;

/// Formats a record as JSON.
pub fn format_json(record: &Value) -> String {
    serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an event as a simple table row.
pub fn format_table_row(event: &ChangeFeedEvent) -> String {
    let time = event
        .record()
        .get("eventTime")
        .and_then(|v| v.as_str())
        .unwrap_or("?");

    format!(
        "{:<36} {:<20} {:<24} {}",
        truncate(event.id().unwrap_or("?"), 36),
        truncate(event.event_type().unwrap_or("?"), 20),
        truncate(time, 24),
        event.subject().unwrap_or("?")
    )
}

/// Prints table header.
#[allow(clippy::print_literal)]
pub fn print_table_header() {
    println!(
        "{:<36} {:<20} {:<24} {}",
        "ID", "TYPE", "EVENT_TIME", "SUBJECT"
    );
    println!("{}", "-".repeat(100));
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
