//! Column derivation.
//!
//! A [`DerivationRule`] pairs a target column with a [`Computation`] and the
//! [`Strategy`] used to evaluate it. Threshold rules can be evaluated by all
//! three strategies and must produce identical columns; the other
//! computations are only expressible as row functions.
//!
//! Values for every row are computed before the column is written, so a
//! failing rule leaves the table untouched.

use std::{fmt, sync::Arc};

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::{Error, Result},
    expr,
    schema::ColumnType,
    table::{Column, Record, Table},
};

pub const DAYS_PER_YEAR: f64 = 365.25;

/// Fractional years between `hired` and `as_of`, counted in calendar days.
pub fn tenure_years(hired: NaiveDate, as_of: NaiveDate) -> f64 {
    (as_of - hired).num_days() as f64 / DAYS_PER_YEAR
}

/// Vacation allowance of the standard tier table: 20+ years earn 25 days,
/// 15+ years earn 20, everyone else 10.
pub fn vacation_days_for_tenure(years: f64) -> i64 {
    TenureRule::standard_tiers().allowance(years)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Gather the source column, compare it as a whole, then label.
    ThresholdCompare,
    /// Compare and label one value at a time.
    Comprehension,
    /// Evaluate a function against each record.
    RowFunction,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::ThresholdCompare => "threshold-compare",
            Strategy::Comprehension => "comprehension",
            Strategy::RowFunction => "row-function",
        })
    }
}

/// Two-label classification: `value >= threshold` gets `above`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub column: String,
    pub threshold: f64,
    #[serde(default = "ThresholdRule::default_above")]
    pub above: String,
    #[serde(default = "ThresholdRule::default_below")]
    pub below: String,
}

impl ThresholdRule {
    pub fn new(column: impl Into<String>, threshold: f64) -> Self {
        Self {
            column: column.into(),
            threshold,
            above: Self::default_above(),
            below: Self::default_below(),
        }
    }

    pub fn with_labels(mut self, above: impl Into<String>, below: impl Into<String>) -> Self {
        self.above = above.into();
        self.below = below.into();
        self
    }

    fn default_above() -> String {
        "yes".to_string()
    }

    fn default_below() -> String {
        "no".to_string()
    }

    pub fn label(&self, value: f64) -> &str {
        if value >= self.threshold {
            &self.above
        } else {
            &self.below
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub min_years: f64,
    pub value: i64,
}

/// Maps tenure since a hire date onto tiered integer values. Tiers are
/// checked from the highest lower bound down; bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct TenureRule {
    pub column: String,
    pub as_of: NaiveDate,
    tiers: Vec<Tier>,
    default: i64,
}

impl TenureRule {
    pub fn new(column: impl Into<String>, as_of: NaiveDate, tiers: Vec<Tier>, default: i64) -> Self {
        let mut tiers = tiers;
        tiers.sort_by(|a, b| b.min_years.total_cmp(&a.min_years));
        Self {
            column: column.into(),
            as_of,
            tiers,
            default,
        }
    }

    pub fn vacation_days(column: impl Into<String>, as_of: NaiveDate) -> Self {
        let standard = Self::standard_tiers();
        Self::new(column, as_of, standard.tiers, standard.default)
    }

    fn standard_tiers() -> Self {
        Self {
            column: String::new(),
            as_of: NaiveDate::MIN,
            tiers: vec![
                Tier {
                    min_years: 20.0,
                    value: 25,
                },
                Tier {
                    min_years: 15.0,
                    value: 20,
                },
            ],
            default: 10,
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn allowance(&self, years: f64) -> i64 {
        self.tiers
            .iter()
            .find(|tier| years >= tier.min_years)
            .map(|tier| tier.value)
            .unwrap_or(self.default)
    }
}

pub type RowFn = Arc<dyn Fn(&Record<'_>) -> std::result::Result<Option<Value>, String> + Send + Sync>;

#[derive(Clone)]
pub enum Computation {
    Threshold(ThresholdRule),
    Tenure(TenureRule),
    /// `evalexpr` expression evaluated per record.
    Expression { expression: String, as_of: NaiveDate },
    Custom { output: ColumnType, function: RowFn },
}

impl Computation {
    pub fn kind(&self) -> &'static str {
        match self {
            Computation::Threshold(_) => "threshold",
            Computation::Tenure(_) => "tenure",
            Computation::Expression { .. } => "expression",
            Computation::Custom { .. } => "custom",
        }
    }

    fn source_column(&self) -> Option<&str> {
        match self {
            Computation::Threshold(rule) => Some(&rule.column),
            Computation::Tenure(rule) => Some(&rule.column),
            Computation::Expression { .. } | Computation::Custom { .. } => None,
        }
    }

    fn evaluate(&self, record: &Record<'_>) -> std::result::Result<Option<Value>, String> {
        match self {
            Computation::Threshold(rule) => {
                let number = numeric_cell(record.get(&rule.column), &rule.column)?;
                Ok(Some(Value::String(rule.label(number).to_string())))
            }
            Computation::Tenure(rule) => match record.get(&rule.column) {
                Some(Value::Date(hired)) => {
                    let years = tenure_years(*hired, rule.as_of);
                    Ok(Some(Value::Integer(rule.allowance(years))))
                }
                Some(other) => Err(format!(
                    "column '{}' holds {} value '{other}', expected a date",
                    rule.column,
                    other.column_type()
                )),
                None => Err(format!("missing value in column '{}'", rule.column)),
            },
            Computation::Expression { expression, as_of } => {
                let context = expr::build_context(record, *as_of)?;
                expr::evaluate_to_value(expression, &context)
            }
            Computation::Custom { function, .. } => function(record),
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computation::Threshold(rule) => f.debug_tuple("Threshold").field(rule).finish(),
            Computation::Tenure(rule) => f.debug_tuple("Tenure").field(rule).finish(),
            Computation::Expression { expression, as_of } => f
                .debug_struct("Expression")
                .field("expression", expression)
                .field("as_of", as_of)
                .finish(),
            Computation::Custom { output, .. } => f
                .debug_struct("Custom")
                .field("output", output)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DerivationRule {
    pub name: String,
    pub computation: Computation,
    pub strategy: Strategy,
}

impl DerivationRule {
    pub fn threshold(name: impl Into<String>, rule: ThresholdRule, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            computation: Computation::Threshold(rule),
            strategy,
        }
    }

    pub fn tenure(name: impl Into<String>, rule: TenureRule) -> Self {
        Self {
            name: name.into(),
            computation: Computation::Tenure(rule),
            strategy: Strategy::RowFunction,
        }
    }

    pub fn expression(name: impl Into<String>, expression: impl Into<String>, as_of: NaiveDate) -> Self {
        Self {
            name: name.into(),
            computation: Computation::Expression {
                expression: expression.into(),
                as_of,
            },
            strategy: Strategy::RowFunction,
        }
    }

    pub fn custom<F>(name: impl Into<String>, output: ColumnType, function: F) -> Self
    where
        F: Fn(&Record<'_>) -> std::result::Result<Option<Value>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            computation: Computation::Custom {
                output,
                function: Arc::new(function),
            },
            strategy: Strategy::RowFunction,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn output_type(&self, values: &[Option<Value>]) -> ColumnType {
        match &self.computation {
            Computation::Threshold(_) => ColumnType::String,
            Computation::Tenure(_) => ColumnType::Integer,
            Computation::Expression { .. } => values
                .iter()
                .flatten()
                .next()
                .map(Value::column_type)
                .unwrap_or(ColumnType::String),
            Computation::Custom { output, .. } => *output,
        }
    }
}

/// Adds or overwrites `rule.name` on every row of `table`.
pub fn derive(table: &mut Table, rule: &DerivationRule) -> Result<()> {
    let values = compute(table, rule)?;
    let datatype = rule.output_type(&values);
    ensure_uniform(rule, datatype, &values)?;
    table.set_column(Column::new(rule.name.clone(), datatype), values)?;
    debug!(
        "Derived column '{}' ({} via {}) for {} row(s)",
        rule.name,
        rule.computation.kind(),
        rule.strategy,
        table.len()
    );
    Ok(())
}

/// Every value of a derived column must share the column's type.
fn ensure_uniform(rule: &DerivationRule, datatype: ColumnType, values: &[Option<Value>]) -> Result<()> {
    let mismatch = values
        .iter()
        .enumerate()
        .find_map(|(row, value)| match value {
            Some(value) if value.column_type() != datatype => Some((row, value)),
            _ => None,
        });
    match mismatch {
        Some((row, value)) => Err(Error::derivation(
            &rule.name,
            Some(row + 1),
            format!(
                "produced {} value '{value}' in a {datatype} column",
                value.column_type()
            ),
        )),
        None => Ok(()),
    }
}

pub fn derive_all(table: &mut Table, rules: &[DerivationRule]) -> Result<()> {
    rules.iter().try_for_each(|rule| derive(table, rule))
}

/// Evaluates `rule` without touching `table`.
pub fn compute(table: &Table, rule: &DerivationRule) -> Result<Vec<Option<Value>>> {
    if let Some(source) = rule.computation.source_column() {
        table.require_column(source)?;
    }
    match (rule.strategy, &rule.computation) {
        (Strategy::ThresholdCompare, Computation::Threshold(threshold)) => {
            threshold_compare(table, &rule.name, threshold)
        }
        (Strategy::Comprehension, Computation::Threshold(threshold)) => {
            threshold_comprehension(table, &rule.name, threshold)
        }
        (Strategy::RowFunction, computation) => table
            .records()
            .map(|record| {
                computation
                    .evaluate(&record)
                    .map_err(|message| Error::derivation(&rule.name, Some(record.index() + 1), message))
            })
            .collect(),
        (strategy, computation) => Err(Error::derivation(
            &rule.name,
            None,
            format!(
                "strategy {strategy} cannot evaluate {} rules",
                computation.kind()
            ),
        )),
    }
}

fn threshold_compare(table: &Table, name: &str, rule: &ThresholdRule) -> Result<Vec<Option<Value>>> {
    let idx = table.require_column(&rule.column)?;
    let column = table
        .column_values(idx)
        .enumerate()
        .map(|(row, cell)| {
            numeric_cell(cell, &rule.column).map_err(|msg| Error::derivation(name, Some(row + 1), msg))
        })
        .collect::<Result<Vec<f64>>>()?;
    let mask = column
        .iter()
        .map(|value| *value >= rule.threshold)
        .collect::<Vec<bool>>();
    Ok(mask
        .into_iter()
        .map(|above| {
            let label = if above { &rule.above } else { &rule.below };
            Some(Value::String(label.clone()))
        })
        .collect())
}

fn threshold_comprehension(
    table: &Table,
    name: &str,
    rule: &ThresholdRule,
) -> Result<Vec<Option<Value>>> {
    let idx = table.require_column(&rule.column)?;
    let mut labels = Vec::with_capacity(table.len());
    for (row, cell) in table.column_values(idx).enumerate() {
        let number =
            numeric_cell(cell, &rule.column).map_err(|msg| Error::derivation(name, Some(row + 1), msg))?;
        labels.push(Some(Value::String(rule.label(number).to_string())));
    }
    Ok(labels)
}

fn numeric_cell(cell: Option<&Value>, column: &str) -> std::result::Result<f64, String> {
    let value = cell.ok_or_else(|| format!("missing value in column '{column}'"))?;
    value.as_f64().ok_or_else(|| {
        format!(
            "column '{column}' holds {} value '{value}', expected a number",
            value.column_type()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn tier_boundaries_are_inclusive_and_checked_highest_first() {
        assert_eq!(vacation_days_for_tenure(20.0), 25);
        assert_eq!(vacation_days_for_tenure(19.99), 20);
        assert_eq!(vacation_days_for_tenure(15.0), 20);
        assert_eq!(vacation_days_for_tenure(14.99), 10);
        assert_eq!(vacation_days_for_tenure(0.0), 10);
        assert_eq!(vacation_days_for_tenure(22.0), 25);
    }

    #[test]
    fn tiers_are_sorted_regardless_of_input_order() {
        let rule = TenureRule::new(
            "hired",
            day(2024, 1, 1),
            vec![
                Tier {
                    min_years: 5.0,
                    value: 12,
                },
                Tier {
                    min_years: 10.0,
                    value: 15,
                },
            ],
            8,
        );
        assert_eq!(rule.allowance(11.0), 15);
        assert_eq!(rule.allowance(6.0), 12);
        assert_eq!(rule.allowance(1.0), 8);
    }

    #[test]
    fn tenure_counts_calendar_days() {
        assert_eq!(tenure_years(day(2004, 1, 1), day(2024, 1, 1)), 20.0);
        assert!(tenure_years(day(2024, 1, 2), day(2024, 1, 1)) < 0.0);
    }

    #[test]
    fn threshold_label_uses_greater_or_equal() {
        let rule = ThresholdRule::new("salary", 7000.0);
        assert_eq!(rule.label(7000.0), "yes");
        assert_eq!(rule.label(6999.99), "no");
    }

    #[test]
    fn strategy_names_match_config_tokens() {
        assert_eq!(Strategy::ThresholdCompare.to_string(), "threshold-compare");
        let parsed: Strategy = serde_yaml::from_str("row-function").unwrap();
        assert_eq!(parsed, Strategy::RowFunction);
    }
}
