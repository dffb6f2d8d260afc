//! Row selection.
//!
//! [`filter`] never mutates its input: it evaluates the predicate against
//! every record and copies the matching rows, in order, into a new table with
//! the same columns.

use std::{cmp::Ordering, fmt, sync::Arc};

use chrono::NaiveDate;
use log::debug;

use crate::{
    data::{Value, parse_naive_date, parse_typed_value},
    error::{Error, Result},
    expr,
    schema::ColumnType,
    table::{Record, Table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub column: String,
    pub operator: ComparisonOperator,
    pub raw_value: String,
}

impl FilterCondition {
    pub fn parse(filter: &str) -> Result<Self> {
        let trimmed = filter.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("Empty filter expression".to_string()));
        }

        let lowered = trimmed.to_ascii_lowercase();
        for (needle, operator) in [
            (" contains ", ComparisonOperator::Contains),
            (" startswith ", ComparisonOperator::StartsWith),
            (" endswith ", ComparisonOperator::EndsWith),
        ] {
            if let Some(idx) = lowered.find(needle) {
                let (left, right_with_space) = trimmed.split_at(idx);
                let right = right_with_space[needle.len()..].trim();
                return Ok(FilterCondition {
                    column: left.trim().to_string(),
                    operator,
                    raw_value: unquote(right).to_string(),
                });
            }
        }

        for (needle, operator) in [
            ("!=", ComparisonOperator::NotEq),
            (">=", ComparisonOperator::Ge),
            ("<=", ComparisonOperator::Le),
            ("==", ComparisonOperator::Eq),
            ("=", ComparisonOperator::Eq),
            (">", ComparisonOperator::Gt),
            ("<", ComparisonOperator::Lt),
        ] {
            if let Some(idx) = trimmed.find(needle) {
                let left = trimmed[..idx].trim();
                let right = trimmed[idx + needle.len()..].trim();
                if left.is_empty() {
                    return Err(Error::Config(format!(
                        "Filter '{trimmed}' is missing a column name"
                    )));
                }
                return Ok(FilterCondition {
                    column: left.to_string(),
                    operator,
                    raw_value: unquote(right).to_string(),
                });
            }
        }

        Err(Error::Config(format!(
            "Failed to parse filter expression '{trimmed}'"
        )))
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if value.len() >= 2
        && ((bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\''))
    {
        return &value[1..value.len() - 1];
    }
    value
}

pub type PredicateFn = Arc<dyn Fn(&Record<'_>) -> bool + Send + Sync>;

/// Pure boolean test over a record.
#[derive(Clone)]
pub enum FilterPredicate {
    /// Every condition must hold.
    Conditions(Vec<FilterCondition>),
    Expression { expression: String, as_of: NaiveDate },
    Custom(PredicateFn),
}

impl FilterPredicate {
    pub fn parse<S: AsRef<str>>(filters: &[S]) -> Result<Self> {
        let conditions = filters
            .iter()
            .map(|f| FilterCondition::parse(f.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(FilterPredicate::Conditions(conditions))
    }

    pub fn custom<F>(function: F) -> Self
    where
        F: Fn(&Record<'_>) -> bool + Send + Sync + 'static,
    {
        FilterPredicate::Custom(Arc::new(function))
    }
}

impl fmt::Debug for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPredicate::Conditions(conditions) => {
                f.debug_tuple("Conditions").field(conditions).finish()
            }
            FilterPredicate::Expression { expression, as_of } => f
                .debug_struct("Expression")
                .field("expression", expression)
                .field("as_of", as_of)
                .finish(),
            FilterPredicate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

struct ResolvedCondition<'a> {
    condition: &'a FilterCondition,
    index: usize,
    rhs: Option<Value>,
}

fn resolve<'a>(table: &Table, condition: &'a FilterCondition) -> Result<ResolvedCondition<'a>> {
    let index = table.require_column(&condition.column)?;
    let datatype = table.columns()[index].datatype;
    let rhs = match datatype {
        ColumnType::Date if !condition.raw_value.is_empty() => Some(Value::Date(
            parse_naive_date(&condition.raw_value, None).map_err(Error::Config)?,
        )),
        other => parse_typed_value(&condition.raw_value, &other).map_err(|err| {
            Error::Config(format!(
                "Filter value for {} column '{}': {err}",
                datatype, condition.column
            ))
        })?,
    };
    Ok(ResolvedCondition {
        condition,
        index,
        rhs,
    })
}

fn evaluate_condition(resolved: &ResolvedCondition<'_>, record: &Record<'_>) -> bool {
    use ComparisonOperator::*;
    let left = record.values()[resolved.index].as_ref();
    let operator = resolved.condition.operator;
    match operator {
        Contains | StartsWith | EndsWith => {
            let haystack = left.map(Value::as_display).unwrap_or_default();
            let needle = resolved.condition.raw_value.as_str();
            match operator {
                Contains => haystack.contains(needle),
                StartsWith => haystack.starts_with(needle),
                _ => haystack.ends_with(needle),
            }
        }
        Eq | NotEq | Gt | Ge | Lt | Le => match (left, resolved.rhs.as_ref()) {
            (Some(left), Some(right)) => match left.compare(right) {
                Some(ordering) => match operator {
                    Eq => ordering == Ordering::Equal,
                    NotEq => ordering != Ordering::Equal,
                    Gt => ordering == Ordering::Greater,
                    Ge => ordering != Ordering::Less,
                    Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => operator == NotEq,
            },
            (None, None) => matches!(operator, Eq | Ge | Le),
            (None, Some(_)) | (Some(_), None) => operator == NotEq,
        },
    }
}

/// Returns the rows of `table` that satisfy `predicate`, in their original order.
pub fn filter(table: &Table, predicate: &FilterPredicate) -> Result<Table> {
    let mut selected = Vec::new();
    match predicate {
        FilterPredicate::Conditions(conditions) => {
            let resolved = conditions
                .iter()
                .map(|condition| resolve(table, condition))
                .collect::<Result<Vec<_>>>()?;
            for record in table.records() {
                if resolved.iter().all(|r| evaluate_condition(r, &record)) {
                    selected.push(record.index());
                }
            }
        }
        FilterPredicate::Expression { expression, as_of } => {
            for record in table.records() {
                let context = expr::build_context(&record, *as_of).map_err(Error::Config)?;
                let keep = expr::evaluate_to_bool(expression, &context).map_err(|err| {
                    Error::Schema(format!("Row {}: {err}", record.index() + 1))
                })?;
                if keep {
                    selected.push(record.index());
                }
            }
        }
        FilterPredicate::Custom(function) => {
            selected.extend(
                table
                    .records()
                    .filter(|record| function(record))
                    .map(|record| record.index()),
            );
        }
    }
    debug!("Filter kept {} of {} row(s)", selected.len(), table.len());
    Ok(table.select_rows(&selected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefers_double_equals() {
        let condition = FilterCondition::parse("high salary == yes").unwrap();
        assert_eq!(condition.column, "high salary");
        assert_eq!(condition.operator, ComparisonOperator::Eq);
        assert_eq!(condition.raw_value, "yes");
    }

    #[test]
    fn parse_handles_text_operators_and_quotes() {
        let condition = FilterCondition::parse("name StartsWith 'Al'").unwrap();
        assert_eq!(condition.operator, ComparisonOperator::StartsWith);
        assert_eq!(condition.raw_value, "Al");

        let condition = FilterCondition::parse("salary >= 7000").unwrap();
        assert_eq!(condition.operator, ComparisonOperator::Ge);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(FilterCondition::parse("   ").is_err());
        assert!(FilterCondition::parse("salary").is_err());
        assert!(FilterCondition::parse("= 5").is_err());
    }
}
