//! Helpers for reading loosely typed backend rows.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

/// Ids arrive as integers or strings depending on the column type.
pub(crate) fn value_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn field_id(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(value_id)
}

pub(crate) fn field_str(row: &Value, key: &str) -> Option<String> {
    row.get(key)?.as_str().map(|s| s.to_string())
}

/// Timestamp in unix milliseconds. Accepts RFC 3339, a naive UTC timestamp
/// (`timestamp without time zone` columns) or a plain integer.
pub(crate) fn field_timestamp(row: &Value, key: &str) -> Option<u64> {
    match row.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<u64> {
    let millis = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.timestamp_millis()
    } else {
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?
            .and_utc()
            .timestamp_millis()
    };
    u64::try_from(millis).ok()
}

/// Counts past `u32::MAX` saturate rather than wrap
pub(crate) fn saturating_count(count: impl TryInto<u32>) -> u32 {
    count.try_into().unwrap_or(u32::MAX)
}

pub(crate) fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_id_accepts_numbers_and_strings() {
        assert_eq!(value_id(&json!(42)), Some("42".to_string()));
        assert_eq!(value_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(value_id(&json!("")), None);
        assert_eq!(value_id(&json!(null)), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("1970-01-01T00:00:01Z"), Some(1000));
        assert_eq!(
            parse_timestamp("2024-05-01T12:00:00.250+00:00"),
            parse_timestamp("2024-05-01T12:00:00.250")
        );
        assert_eq!(parse_timestamp("1970-01-01 00:00:02"), Some(2000));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_saturating_count() {
        assert_eq!(saturating_count(7usize), 7);
        assert_eq!(saturating_count(u64::from(u32::MAX) + 1), u32::MAX);
        assert_eq!(saturating_count(u64::MAX), u32::MAX);
    }

    #[test]
    fn test_field_timestamp_integer() {
        let row = json!({"created_at": 1234});
        assert_eq!(field_timestamp(&row, "created_at"), Some(1234));
    }
}
