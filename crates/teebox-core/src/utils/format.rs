use chrono::{DateTime, Utc};

/// Format a timestamp as a calendar date, e.g. "Jan 01, 2024"
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%b %d, %Y").to_string()
}
