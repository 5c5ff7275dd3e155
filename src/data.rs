use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single non-null cell. Nulls are represented as `Option::None` at the
/// dataset level so every comparison has to acknowledge them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Numeric coercion used by tolerance rules and numeric summaries.
    /// Strings are parsed after trimming; booleans never coerce.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Boolean(_) => None,
        }
    }

    /// Literal equality. Integers and floats compare by numeric value, every
    /// other pairing requires the same variant. NaN equals NaN so a value
    /// always equals itself.
    pub fn literal_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Float(a), Value::Float(b)) => same_number(*a, *b),
            (a, b) => a == b,
        }
    }
}

/// Numeric identity: `==`, plus NaN matching NaN.
pub fn same_number(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Hashable, coercion-free identity of a key cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyToken {
    Null,
    Integer(i64),
    Float(u64),
    Boolean(bool),
    String(String),
}

impl KeyToken {
    pub fn from_cell(cell: Option<&Value>) -> Self {
        match cell {
            None => KeyToken::Null,
            Some(Value::Integer(i)) => KeyToken::Integer(*i),
            Some(Value::Float(f)) => {
                // -0.0 and 0.0 are the same key
                let normalized = if *f == 0.0 { 0f64 } else { *f };
                KeyToken::Float(normalized.to_bits())
            }
            Some(Value::Boolean(b)) => KeyToken::Boolean(*b),
            Some(Value::String(s)) => KeyToken::String(s.clone()),
        }
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyToken::Null => write!(f, "null"),
            KeyToken::Integer(i) => write!(f, "{i}"),
            KeyToken::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyToken::Boolean(b) => write!(f, "{b}"),
            KeyToken::String(s) => write!(f, "'{s}'"),
        }
    }
}

pub fn format_cell(cell: Option<&Value>) -> String {
    cell.map(Value::as_display)
        .unwrap_or_else(|| "null".to_string())
}

pub fn parse_boolean_token(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Permissive temporal parser: datetimes, RFC 3339 timestamps (normalised to
/// UTC), then plain dates at midnight.
pub fn parse_temporal(value: &str) -> Option<NaiveDateTime> {
    if let Some(parsed) = parse_naive_datetime(value) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value.trim()) {
        return Some(parsed.naive_utc());
    }
    parse_naive_date(value).and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn literal_eq_crosses_integer_and_float() {
        assert!(Value::Integer(25).literal_eq(&Value::Float(25.0)));
        assert!(!Value::Integer(25).literal_eq(&Value::Float(25.5)));
        assert!(!Value::Integer(1).literal_eq(&Value::String("1".to_string())));
        assert!(Value::Float(f64::NAN).literal_eq(&Value::Float(f64::NAN)));
        assert!(Value::Float(f64::INFINITY).literal_eq(&Value::Float(f64::INFINITY)));
        assert!(!Value::Float(f64::INFINITY).literal_eq(&Value::Float(f64::NEG_INFINITY)));
        assert!(!Value::Float(f64::NAN).literal_eq(&Value::Float(1.0)));
    }

    #[test]
    fn to_f64_parses_trimmed_strings_only() {
        assert_eq!(Value::String(" 10.5 ".to_string()).to_f64(), Some(10.5));
        assert_eq!(Value::String("ten".to_string()).to_f64(), None);
        assert_eq!(Value::Boolean(true).to_f64(), None);
        assert_eq!(Value::Integer(-3).to_f64(), Some(-3.0));
    }

    #[test]
    fn key_tokens_do_not_coerce() {
        let number = KeyToken::from_cell(Some(&Value::Integer(1)));
        let text = KeyToken::from_cell(Some(&Value::String("1".to_string())));
        assert_ne!(number, text);
        assert_eq!(
            KeyToken::from_cell(Some(&Value::Float(-0.0))),
            KeyToken::from_cell(Some(&Value::Float(0.0)))
        );
        assert_eq!(KeyToken::from_cell(None), KeyToken::Null);
    }

    #[test]
    fn display_keeps_float_marker() {
        assert_eq!(Value::Float(25.0).as_display(), "25.0");
        assert_eq!(Value::Float(85.5).as_display(), "85.5");
        assert_eq!(format_cell(None), "null");
    }

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06"), Some(expected));
        assert_eq!(parse_naive_date("2024/05/06"), Some(expected));
        assert_eq!(parse_naive_date("06 May 2024"), Some(expected));
        assert_eq!(parse_naive_date("May 06, 2024"), Some(expected));
        assert_eq!(parse_naive_date("not a date"), None);
    }

    #[test]
    fn parse_temporal_accepts_dates_datetimes_and_rfc3339() {
        let midnight = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_temporal("2024-05-06"), Some(midnight));
        assert_eq!(
            parse_temporal("2024-05-06T14:30:00"),
            midnight.checked_add_signed(chrono::Duration::minutes(14 * 60 + 30))
        );
        assert_eq!(
            parse_temporal("2024-05-06T02:00:00+02:00"),
            Some(midnight)
        );
    }
}
