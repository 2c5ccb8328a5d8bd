//! Field normalization shared by the aggregators.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::models::video::VIEW_COUNT_UNAVAILABLE;

/// `{width}`, `{height}` and their `%{...}` variants.
static THUMBNAIL_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%?\{(width|height)\}").unwrap());

/// Compact view count: `999`, `1.5K`, `2.3M`.
///
/// The first decimal is rounded half-up with integer arithmetic, so the
/// output is stable for every `u64`.
pub fn format_view_count(count: u64) -> String {
    let n = count as u128;
    if n < 1_000 {
        n.to_string()
    } else if n < 1_000_000 {
        let tenths = (n * 10 + 500) / 1_000;
        format!("{}.{}K", tenths / 10, tenths % 10)
    } else {
        let tenths = (n * 10 + 500_000) / 1_000_000;
        format!("{}.{}M", tenths / 10, tenths % 10)
    }
}

/// Formats a decimal count as delivered by upstream APIs (a JSON string).
pub fn format_view_count_str(raw: &str) -> String {
    match raw.trim().parse::<u64>() {
        Ok(count) => format_view_count(count),
        Err(_) => VIEW_COUNT_UNAVAILABLE.to_string(),
    }
}

pub fn fill_thumbnail_template(template: &str, width: u32, height: u32) -> String {
    THUMBNAIL_PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "width" => width.to_string(),
            _ => height.to_string(),
        })
        .into_owned()
}

/// Entity-encode free text before it is handed to the page layer.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// `3/7/2025`. Unparsable input is returned unchanged.
pub fn numeric_date(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|t| t.format("%-m/%-d/%Y").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// `Mar 7, 2025`. Unparsable input is returned unchanged.
pub fn display_date(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|t| t.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// `7:00 PM UTC`. Empty when the input cannot be parsed.
pub fn display_time(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|t| t.format("%-I:%M %p UTC").to_string())
        .unwrap_or_default()
}
