pub mod events;
pub mod export;
pub mod scope;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;

use chrono::SecondsFormat;

/// Current UTC time as a fixed-width RFC 3339 string (millisecond precision),
/// so stored timestamps order lexicographically.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Truncate content to max_chars, appending "..." if truncated.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let end = content
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(content.len());
        format!("{}...", &content[..end])
    }
}
