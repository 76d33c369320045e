//! Date handling for RSS `pubDate` values.
//!
//! Feeds use the RFC-822 layout (`Tue, 10 Jun 2003 04:00:00 GMT`). A value that
//! is missing or does not parse is replaced by the current time, never an error.

use chrono::{DateTime, Utc};

/// Parses an RFC-822 date, falling back to now.
pub fn xml_date_to_date(value: Option<&str>) -> DateTime<Utc> {
    value.and_then(parse_rfc822).unwrap_or_else(Utc::now)
}

/// Strict parse without the fallback. Accepts numeric offsets and the
/// obsolete zone names (GMT, UT, EST, PDT, ...).
pub fn parse_rfc822(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `YYYY-MM-DD`, used by list output.
pub fn short_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}
