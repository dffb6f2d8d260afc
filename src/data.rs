use std::{cmp::Ordering, fmt};

use chrono::{Datelike, NaiveDate};

use crate::schema::ColumnType;

/// Tried in order. Ambiguous slash dates read month first; `13/05/2024`
/// still falls through to the day-first format.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Numeric view used by thresholds and chart axes. Dates map to their
    /// day number so they can share a continuous axis.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Date(d) => Some(f64::from(d.num_days_from_ce())),
            Value::String(_) | Value::Boolean(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Date(_) => ColumnType::Date,
        }
    }

    /// Orders values of the same variant; integers and floats compare numerically.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Float(_) | Value::Integer(_), Value::Float(_) | Value::Integer(_)) => {
                let left = self.as_f64()?;
                let right = other.as_f64()?;
                Some(left.total_cmp(&right))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str, format: Option<&str>) -> Result<NaiveDate, String> {
    if let Some(fmt) = format {
        return NaiveDate::parse_from_str(value, fmt)
            .map_err(|err| format!("Failed to parse '{value}' as date with format '{fmt}': {err}"));
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(format!("Failed to parse '{value}' as date"))
}

pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Parses a non-date field according to its declared type. Empty fields are
/// missing values.
pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = value
                .parse()
                .map_err(|_| format!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .parse()
                .map_err(|_| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Boolean => {
            let lowered = value.to_ascii_lowercase();
            let parsed = match lowered.as_str() {
                "true" | "t" | "yes" | "y" | "1" => true,
                "false" | "f" | "no" | "n" | "0" => false,
                _ => return Err(format!("Failed to parse '{value}' as boolean")),
            };
            Value::Boolean(parsed)
        }
        ColumnType::Date => Value::Date(parse_naive_date(value, None)?),
    };
    Ok(Some(parsed))
}

pub fn value_to_evalexpr(value: &Value) -> evalexpr::Value {
    match value {
        Value::String(s) => evalexpr::Value::String(s.clone()),
        Value::Integer(i) => evalexpr::Value::Int(*i),
        Value::Float(f) => evalexpr::Value::Float(*f),
        Value::Boolean(b) => evalexpr::Value::Boolean(*b),
        Value::Date(d) => evalexpr::Value::String(d.format("%Y-%m-%d").to_string()),
    }
}

pub fn evalexpr_to_value(value: evalexpr::Value) -> Option<Value> {
    match value {
        evalexpr::Value::String(s) => Some(Value::String(s)),
        evalexpr::Value::Int(i) => Some(Value::Integer(i)),
        evalexpr::Value::Float(f) => Some(Value::Float(f)),
        evalexpr::Value::Boolean(b) => Some(Value::Boolean(b)),
        evalexpr::Value::Tuple(values) => Some(Value::String(
            values
                .into_iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("|"),
        )),
        evalexpr::Value::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalexpr::Value as EvalValue;

    #[test]
    fn normalize_column_name_replaces_non_alphanumeric() {
        assert_eq!(normalize_column_name("hire date"), "hire_date");
        assert_eq!(normalize_column_name("High-Salary"), "high_salary");
    }

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06", None).unwrap(), expected);
        assert_eq!(parse_naive_date("05/06/2024", None).unwrap(), expected);
        assert_eq!(
            parse_naive_date("13/05/2024", None).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 13).unwrap()
        );
        assert_eq!(parse_naive_date("2024/05/06", None).unwrap(), expected);
    }

    #[test]
    fn parse_naive_date_honours_explicit_format() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(
            parse_naive_date("05/06/2024", Some("%m/%d/%Y")).unwrap(),
            expected
        );
        assert!(parse_naive_date("2024-05-06", Some("%m/%d/%Y")).is_err());
    }

    #[test]
    fn parse_typed_value_handles_empty_and_boolean_inputs() {
        assert_eq!(parse_typed_value("", &ColumnType::Integer).unwrap(), None);
        assert_eq!(
            parse_typed_value("Yes", &ColumnType::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert!(parse_typed_value("maybe", &ColumnType::Boolean).is_err());
        assert!(parse_typed_value("7k", &ColumnType::Integer).is_err());
    }

    #[test]
    fn compare_mixes_integers_and_floats() {
        let int = Value::Integer(7000);
        let float = Value::Float(6999.5);
        assert_eq!(int.compare(&float), Some(Ordering::Greater));
        assert_eq!(int.compare(&Value::String("7000".into())), None);
    }

    #[test]
    fn float_display_drops_integral_fraction() {
        assert_eq!(Value::Float(7000.0).as_display(), "7000");
        assert_eq!(Value::Float(12.5).as_display(), "12.5");
    }

    #[test]
    fn value_to_evalexpr_preserves_variants() {
        assert_eq!(value_to_evalexpr(&Value::Integer(42)), EvalValue::Int(42));
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(
            value_to_evalexpr(&Value::Date(date)),
            EvalValue::String("2024-05-06".to_string())
        );
        assert_eq!(evalexpr_to_value(EvalValue::Empty), None);
    }
}
