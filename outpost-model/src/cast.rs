//! Type coercion from raw values to a field's declared kind.
//!
//! Conversions follow the usual dynamic-language rules: anything becomes a
//! string through its string form, strings parse as numbers (empty → 0,
//! garbage → NaN), truthiness decides booleans, and a lone value written to
//! an array field becomes a one-element array. `Null` is never coerced; it
//! clears the field instead.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};
use outpost_types::{DocumentId, Value};

use crate::error::{ModelError, ModelResult};
use crate::schema::FieldKind;

/// Casts `value` to `kind`. `field` is only used for error messages.
pub fn cast(field: &str, kind: &FieldKind, value: Value) -> ModelResult<Value> {
    if value.is_null() {
        return Ok(value);
    }
    match kind {
        FieldKind::String => Ok(to_string(value)),
        FieldKind::Number => Ok(Value::Number(to_number(&value))),
        FieldKind::Boolean => Ok(Value::Bool(truthy(&value))),
        FieldKind::Date => to_date(field, value).map(Value::Date),
        FieldKind::Identifier => to_identifier(field, value).map(Value::Id),
        FieldKind::Array(items) => {
            let elements = match value {
                Value::Array(elements) => elements,
                other => vec![other],
            };
            match items {
                None => Ok(Value::Array(elements)),
                Some(item_kind) => cast_elements(field, item_kind, elements).map(Value::Array),
            }
        }
        FieldKind::Object(_) => match value {
            Value::Object(_) => Ok(value),
            other => Err(ModelError::cast(field, "object", other.kind_name())),
        },
        FieldKind::Any | FieldKind::Virtual(_) => Ok(value),
    }
}

/// Casts each element of a sequence to the declared element kind.
pub fn cast_elements(field: &str, item_kind: &FieldKind, elements: Vec<Value>) -> ModelResult<Vec<Value>> {
    elements
        .into_iter()
        .map(|element| cast(field, item_kind, element))
        .collect()
}

fn to_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        other => Value::String(other.to_string()),
    }
}

pub(crate) fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::String(s) => parse_number(s),
        Value::Date(d) => d.timestamp_millis() as f64,
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [only] => to_number(only),
            _ => f64::NAN,
        },
        Value::Object(_) | Value::Id(_) => f64::NAN,
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust also accepts "inf"/"nan" spellings, which are not numbers here.
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        Value::Date(_) | Value::Id(_) | Value::Array(_) | Value::Object(_) => true,
    }
}

/// Dates hold whole milliseconds, like the display form.
fn to_date(field: &str, value: Value) -> ModelResult<DateTime<Utc>> {
    let date = match value {
        Value::Date(d) => Ok(d),
        Value::Number(n) if n.is_finite() => Utc
            .timestamp_millis_opt(n as i64)
            .single()
            .ok_or_else(|| ModelError::cast(field, "date", n.to_string())),
        Value::String(s) => parse_date(&s).ok_or_else(|| ModelError::cast(field, "date", s)),
        other => Err(ModelError::cast(field, "date", other.kind_name())),
    }?;
    Ok(date.trunc_subsecs(3))
}

/// Accepts RFC 3339, RFC 2822, a naive date-time (read as UTC) or a bare
/// calendar date (midnight UTC).
pub(crate) fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(text) {
        return Some(d.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn to_identifier(field: &str, value: Value) -> ModelResult<DocumentId> {
    match value {
        Value::Id(id) => Ok(id),
        Value::String(s) => DocumentId::parse(&s).map_err(|_| ModelError::cast(field, "identifier", s)),
        other => Err(ModelError::cast(field, "identifier", other.kind_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_like_native_conversion() {
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("  42 "), 42.0);
        assert_eq!(parse_number("1e3"), 1000.0);
        assert!(parse_number("abc").is_nan());
        assert!(parse_number("inf").is_nan());
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn dates_parse_common_forms() {
        let expected = Utc.with_ymd_and_hms(2020, 2, 3, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2020-02-03"), Some(expected));
        assert_eq!(parse_date("2020-02-03T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2020-02-03T00:00:00.000"), Some(expected));
        assert_eq!(parse_date("2020-02-03T01:00:00+01:00"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn date_casts_drop_sub_millisecond_precision() {
        let cast = to_date("when", Value::from("2020-01-01T00:00:00.0019999Z")).unwrap();
        assert_eq!(cast.timestamp_millis(), 1_577_836_800_001);
        assert_eq!(cast.timestamp_subsec_nanos(), 1_000_000);
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&Value::from("")));
        assert!(truthy(&Value::from("false")));
        assert!(!truthy(&Value::Number(f64::NAN)));
        assert!(truthy(&Value::array()));
    }
}
