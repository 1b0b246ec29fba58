//! Typed value conversion between JSON payloads, query parameters and the
//! physical columns.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::QueryResult;
use serde_json::Value as JsonValue;

use super::catalog::ColumnKind;

/// A value bound for one physical column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Text(String),
    Int(i64),
    Decimal(Decimal),
    Double(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl ColumnValue {
    /// Parse a JSON payload value for a column of the given kind.
    ///
    /// Returns a human-readable message on mismatch; those surface as
    /// field-level validation errors.
    pub fn parse(kind: ColumnKind, value: &JsonValue) -> Result<Self, String> {
        if value.is_null() {
            return Ok(ColumnValue::Null);
        }

        match kind {
            ColumnKind::Text | ColumnKind::LongText => match value {
                JsonValue::String(s) => Ok(ColumnValue::Text(s.clone())),
                JsonValue::Number(n) => Ok(ColumnValue::Text(n.to_string())),
                JsonValue::Bool(b) => Ok(ColumnValue::Text(b.to_string())),
                _ => Err("expected a string".to_string()),
            },
            ColumnKind::Integer => match value {
                JsonValue::Number(n) => n
                    .as_i64()
                    .map(ColumnValue::Int)
                    .ok_or_else(|| "expected an integer".to_string()),
                JsonValue::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(ColumnValue::Int)
                    .map_err(|_| format!("'{s}' is not an integer")),
                _ => Err("expected an integer".to_string()),
            },
            ColumnKind::Decimal => match value {
                JsonValue::Number(_) => value
                    .as_str()
                    .map(str::to_string)
                    .or_else(|| Some(value.to_string()))
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .map(ColumnValue::Decimal)
                    .ok_or_else(|| "expected a decimal number".to_string()),
                JsonValue::String(s) => s
                    .trim()
                    .parse::<Decimal>()
                    .map(ColumnValue::Decimal)
                    .map_err(|_| format!("'{s}' is not a decimal number")),
                _ => Err("expected a decimal number".to_string()),
            },
            ColumnKind::Double => match value {
                JsonValue::Number(n) => n
                    .as_f64()
                    .map(ColumnValue::Double)
                    .ok_or_else(|| "expected a number".to_string()),
                JsonValue::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(ColumnValue::Double)
                    .map_err(|_| format!("'{s}' is not a number")),
                _ => Err("expected a number".to_string()),
            },
            ColumnKind::Bool => match value {
                JsonValue::Bool(b) => Ok(ColumnValue::Bool(*b)),
                JsonValue::String(s) => match s.as_str() {
                    "true" | "1" => Ok(ColumnValue::Bool(true)),
                    "false" | "0" => Ok(ColumnValue::Bool(false)),
                    _ => Err(format!("'{s}' is not a boolean")),
                },
                _ => Err("expected a boolean".to_string()),
            },
            ColumnKind::Date => match value {
                JsonValue::String(s) => parse_date(s)
                    .map(ColumnValue::Date)
                    .ok_or_else(|| format!("'{s}' is not a date (YYYY-MM-DD)")),
                _ => Err("expected a date string".to_string()),
            },
            ColumnKind::DateTime => match value {
                JsonValue::String(s) => parse_datetime(s)
                    .map(ColumnValue::DateTime)
                    .ok_or_else(|| format!("'{s}' is not a datetime")),
                _ => Err("expected a datetime string".to_string()),
            },
        }
    }

    /// Parse a query-parameter string for a column of the given kind.
    pub fn parse_str(kind: ColumnKind, raw: &str) -> Result<Self, String> {
        Self::parse(kind, &JsonValue::String(raw.to_string()))
    }

    /// Convert into a SeaORM bind value. NULLs are typed per column kind so
    /// the database can infer parameter types.
    pub fn into_value(self, kind: ColumnKind) -> sea_orm::Value {
        match self {
            ColumnValue::Null => match kind {
                ColumnKind::Text | ColumnKind::LongText => sea_orm::Value::String(None),
                ColumnKind::Integer => sea_orm::Value::BigInt(None),
                ColumnKind::Decimal => sea_orm::Value::Decimal(None),
                ColumnKind::Double => sea_orm::Value::Double(None),
                ColumnKind::Bool => sea_orm::Value::Bool(None),
                ColumnKind::Date => sea_orm::Value::ChronoDate(None),
                ColumnKind::DateTime => sea_orm::Value::ChronoDateTimeUtc(None),
            },
            ColumnValue::Text(s) => sea_orm::Value::String(Some(Box::new(s))),
            ColumnValue::Int(i) => sea_orm::Value::BigInt(Some(i)),
            ColumnValue::Decimal(d) => sea_orm::Value::Decimal(Some(Box::new(d))),
            ColumnValue::Double(f) => sea_orm::Value::Double(Some(f)),
            ColumnValue::Bool(b) => sea_orm::Value::Bool(Some(b)),
            ColumnValue::Date(d) => sea_orm::Value::ChronoDate(Some(Box::new(d))),
            ColumnValue::DateTime(dt) => sea_orm::Value::ChronoDateTimeUtc(Some(Box::new(dt))),
        }
    }

    /// Render the value for verify-expression matching.
    pub fn display_for_verify(&self) -> Option<String> {
        match self {
            ColumnValue::Null => None,
            ColumnValue::Text(s) => Some(s.clone()),
            ColumnValue::Int(i) => Some(i.to_string()),
            ColumnValue::Decimal(d) => Some(d.to_string()),
            ColumnValue::Double(f) => Some(f.to_string()),
            ColumnValue::Bool(b) => Some(b.to_string()),
            ColumnValue::Date(d) => Some(d.to_string()),
            ColumnValue::DateTime(dt) => Some(dt.to_rfc3339()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    // A bare date filters/binds as midnight UTC.
    parse_date(s).map(|d| Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap_or_default()))
}

/// Decode one aliased output column from a query result row into JSON.
pub fn decode_column(
    row: &QueryResult,
    alias: &str,
    kind: ColumnKind,
) -> Result<JsonValue, sea_orm::DbErr> {
    let value = match kind {
        ColumnKind::Text | ColumnKind::LongText => row
            .try_get::<Option<String>>("", alias)?
            .map(JsonValue::String),
        // Tenant columns are 32-bit, spare int columns 64-bit; postgres
        // decodes each strictly.
        ColumnKind::Integer => match row.try_get::<Option<i64>>("", alias) {
            Ok(v) => v.map(|v| JsonValue::Number(v.into())),
            Err(_) => row
                .try_get::<Option<i32>>("", alias)?
                .map(|v| JsonValue::Number(v.into())),
        },
        ColumnKind::Decimal => row
            .try_get::<Option<Decimal>>("", alias)?
            .map(|v| JsonValue::String(v.to_string())),
        ColumnKind::Double => row
            .try_get::<Option<f64>>("", alias)?
            .and_then(|v| serde_json::Number::from_f64(v).map(JsonValue::Number)),
        ColumnKind::Bool => row.try_get::<Option<bool>>("", alias)?.map(JsonValue::Bool),
        ColumnKind::Date => row
            .try_get::<Option<NaiveDate>>("", alias)?
            .map(|v| JsonValue::String(v.to_string())),
        ColumnKind::DateTime => row
            .try_get::<Option<DateTime<FixedOffset>>>("", alias)?
            .map(|v| JsonValue::String(v.with_timezone(&Utc).to_rfc3339())),
    };

    Ok(value.unwrap_or(JsonValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_coerces_scalars() {
        assert_eq!(
            ColumnValue::parse(ColumnKind::Text, &json!("abc")).unwrap(),
            ColumnValue::Text("abc".to_string())
        );
        assert_eq!(
            ColumnValue::parse(ColumnKind::Text, &json!(42)).unwrap(),
            ColumnValue::Text("42".to_string())
        );
        assert!(ColumnValue::parse(ColumnKind::Text, &json!([1, 2])).is_err());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(
            ColumnValue::parse(ColumnKind::Integer, &json!(5)).unwrap(),
            ColumnValue::Int(5)
        );
        assert_eq!(
            ColumnValue::parse(ColumnKind::Integer, &json!("12")).unwrap(),
            ColumnValue::Int(12)
        );
        assert!(ColumnValue::parse(ColumnKind::Integer, &json!("abc")).is_err());
        assert!(ColumnValue::parse(ColumnKind::Integer, &json!(1.5)).is_err());
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            ColumnValue::parse(ColumnKind::Decimal, &json!("3.1400")).unwrap(),
            ColumnValue::Decimal("3.1400".parse().unwrap())
        );
        assert_eq!(
            ColumnValue::parse(ColumnKind::Decimal, &json!(2.5)).unwrap(),
            ColumnValue::Decimal("2.5".parse().unwrap())
        );
    }

    #[test]
    fn test_parse_date_and_datetime() {
        assert_eq!(
            ColumnValue::parse(ColumnKind::Date, &json!("2022-01-20")).unwrap(),
            ColumnValue::Date(NaiveDate::from_ymd_opt(2022, 1, 20).unwrap())
        );
        assert!(ColumnValue::parse(ColumnKind::Date, &json!("01/20/2022")).is_err());

        let dt = ColumnValue::parse(ColumnKind::DateTime, &json!("2022-01-20 10:30:00")).unwrap();
        match dt {
            ColumnValue::DateTime(dt) => {
                assert_eq!(dt.to_rfc3339(), "2022-01-20T10:30:00+00:00");
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_null_passthrough() {
        assert_eq!(
            ColumnValue::parse(ColumnKind::Integer, &JsonValue::Null).unwrap(),
            ColumnValue::Null
        );
        assert!(ColumnValue::Null.display_for_verify().is_none());
    }
}
