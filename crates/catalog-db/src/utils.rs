//! Shared utility functions

use chrono::{DateTime, Utc};

/// Parse a datetime string (RFC3339 format) or return current time
///
/// Rows written by this crate always carry RFC3339 timestamps; the fallback
/// only matters for rows edited by hand.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Format a price in minor units as a decimal string
///
/// # Examples
///
/// ```
/// use catalog_db::utils::format_price;
///
/// assert_eq!(format_price(129999), "1299.99");
/// assert_eq!(format_price(5), "0.05");
/// ```
pub fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Escape `%`, `_` and the escape character itself for a SQL `LIKE` pattern
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
