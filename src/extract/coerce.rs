//! Tolerant value coercion.
//!
//! Provider values arrive as JSON numbers, numeric strings, or junk. None of
//! these functions fail: numbers degrade to `None`/`0`, dates to `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Whether a column value counts as "set" for fallback resolution.
///
/// Null, `false`, zero and the empty string are all treated as absent so the
/// next candidate column (or a derived value) is tried.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Converts a value to a finite number, if it holds one.
pub fn to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_prefix(s),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}

/// Like [`to_number`] but yields `0.0` for anything non-numeric.
pub fn coerce_number(value: &Value) -> f64 {
    to_number(value).unwrap_or(0.0)
}

/// Parses the longest leading decimal number of `raw` (`"12.5 SOL"` -> 12.5).
fn parse_number_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }

    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }

    if !has_digits {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Parses a provider timestamp into UTC.
///
/// Dune renders timestamps as `2025-08-07 14:26:58.000 UTC`; the trailing
/// ` UTC` and the date/time space are normalised before parsing. RFC 3339,
/// naive date-times (taken as UTC) and bare dates are accepted.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut normalized = match trimmed.strip_suffix(" UTC") {
        Some(rest) => format!("{}Z", rest.trim_end()),
        None => trimmed.to_string(),
    };
    if normalized.as_bytes().get(10) == Some(&b' ') {
        normalized.replace_range(10..11, "T");
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_presence() {
        assert!(!is_present(&json!(null)));
        assert!(!is_present(&json!(false)));
        assert!(!is_present(&json!(0)));
        assert!(!is_present(&json!(0.0)));
        assert!(!is_present(&json!("")));
        assert!(is_present(&json!("0")));
        assert!(is_present(&json!(-1)));
        assert!(is_present(&json!("abc")));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(coerce_number(&json!(500)), 500.0);
        assert_eq!(coerce_number(&json!("300.25")), 300.25);
        assert_eq!(coerce_number(&json!(" 42 ")), 42.0);
        assert_eq!(coerce_number(&json!("-1.5e3")), -1500.0);
        assert_eq!(coerce_number(&json!("12.5 SOL")), 12.5);
        assert_eq!(coerce_number(&json!(".5")), 0.5);
        assert_eq!(coerce_number(&json!("7e")), 7.0);
    }

    #[test]
    fn test_garbage_numbers_are_zero() {
        for value in [
            json!("not-a-number"),
            json!("NaN"),
            json!("inf"),
            json!("-"),
            json!("."),
            json!(true),
            json!(null),
            json!([1]),
            json!({ "a": 1 }),
        ] {
            let n = coerce_number(&value);
            assert_eq!(n, 0.0, "value {:?}", value);
            assert!(!n.is_nan());
        }
    }

    #[test]
    fn test_dune_timestamp() {
        let expected = Utc.with_ymd_and_hms(2025, 8, 7, 14, 26, 58).unwrap();
        assert_eq!(parse_timestamp("2025-08-07 14:26:58.000 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-07T14:26:58.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-07T16:26:58+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-07 14:26:58"), Some(expected));
    }

    #[test]
    fn test_bare_date() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 24, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-24"), Some(expected));
    }

    #[test]
    fn test_unparseable_timestamps() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-13-40 99:99:99 UTC"), None);
        assert_eq!(parse_timestamp(" UTC"), None);
    }
}
