use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Naive formats accepted when a timestamp carries no zone; such values
/// are assumed UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Re-emit an instant in the wire format: RFC3339 UTC with a literal
/// `Z`, subseconds only when present. Stored timestamps are bit-exact
/// and sorted as strings, so this is a strict output contract.
#[must_use]
pub fn format_utc_z(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a timestamp string in any accepted source format.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if looks_like_epoch(text) {
        return parse_epoch(text);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

/// Parse a timestamp from a JSON value: numbers are epoch seconds (or
/// milliseconds when the magnitude says so), strings go through the
/// textual formats.
#[must_use]
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                epoch_to_datetime(int as f64)
            } else {
                n.as_f64().and_then(epoch_to_datetime)
            }
        }
        _ => None,
    }
}

/// Normalize any accepted timestamp value to the wire format.
#[must_use]
pub fn normalize_timestamp_value(value: &Value) -> Option<String> {
    parse_timestamp_value(value).map(format_utc_z)
}

fn looks_like_epoch(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let mut dots = 0;
    for ch in digits.chars() {
        if ch == '.' {
            dots += 1;
            if dots > 1 {
                return false;
            }
        } else if !ch.is_ascii_digit() {
            return false;
        }
    }
    !digits.is_empty() && digits.chars().any(|c| c.is_ascii_digit())
}

fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    let value: f64 = text.parse().ok()?;
    epoch_to_datetime(value)
}

fn epoch_to_datetime(value: f64) -> Option<DateTime<Utc>> {
    // Millisecond epochs are unambiguous by magnitude: 1e12 seconds is
    // the year 33658.
    let seconds = if value.abs() >= 1e12 {
        value / 1000.0
    } else {
        value
    };
    let secs = seconds.floor() as i64;
    let nanos = ((seconds - seconds.floor()) * 1e9).round() as u32;
    DateTime::from_timestamp(secs, nanos)
}
