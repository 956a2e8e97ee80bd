use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use inyoka_markup::{ArgValue, Node};

/// Display format of dates and times.
pub(crate) const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// A formatted date. Accepts ISO 8601 or seconds since the epoch; no date
/// means now.
pub(super) fn date(value: &ArgValue, now: DateTime<Utc>) -> Node {
    let parsed = match value {
        ArgValue::None => Some(now),
        ArgValue::Int(seconds) => DateTime::from_timestamp(*seconds, 0),
        ArgValue::Str(raw) => parse_date(raw.trim(), now),
        ArgValue::Float(_) | ArgValue::Bool(_) => None,
    };
    match parsed {
        Some(date) => Node::text(date.format(DATE_FORMAT).to_string()),
        None => Node::text("ungültiges Datum"),
    }
}

fn parse_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return Some(now);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Some(date) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(date.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|date| date.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
}
