use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{EpicurveError, Result};

/// Formats tried in order after the ISO date.
const FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Parse a report date.
///
/// Accepts ISO-8601 dates (`2020-03-01`), full ISO timestamps (the time part
/// is discarded) and the US short and long forms used by provider exports
/// (`3/1/20`, `03/01/2020`).
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(EpicurveError::DateParse(s.to_string()));
    }

    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(d);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| EpicurveError::DateParse(s.to_string()))
}
