mod common;

use chrono::NaiveDate;
use common::{as_of, employees, load_employees_str};
use csv_enrich::{
    data::Value,
    derive::{self, DerivationRule, Strategy, TenureRule, ThresholdRule},
    error::Error,
    schema::ColumnType,
    table::{Column, Table},
};
use proptest::prelude::{prop, prop_assert_eq, proptest};

fn high_salary(strategy: Strategy) -> DerivationRule {
    DerivationRule::threshold("high salary", ThresholdRule::new("salary", 7000.0), strategy)
}

fn labels(table: &Table, column: &str) -> Vec<String> {
    let idx = table.column_index(column).expect("column exists");
    table
        .column_values(idx)
        .map(|value| value.map(Value::as_display).unwrap_or_default())
        .collect()
}

#[test]
fn salary_threshold_labels_every_strategy() {
    for strategy in [
        Strategy::ThresholdCompare,
        Strategy::Comprehension,
        Strategy::RowFunction,
    ] {
        let mut table = employees();
        derive::derive(&mut table, &high_salary(strategy)).expect("derive");
        assert_eq!(labels(&table, "high salary"), vec!["no", "yes", "yes"], "{strategy}");
        assert_eq!(table.column("high salary").unwrap().datatype, ColumnType::String);
    }
}

#[test]
fn deriving_twice_overwrites_in_place() {
    let mut table = employees();
    derive::derive(&mut table, &high_salary(Strategy::ThresholdCompare)).unwrap();
    let once = table.clone();
    derive::derive(&mut table, &high_salary(Strategy::Comprehension)).unwrap();
    assert_eq!(table, once);
    assert_eq!(table.columns().len(), 4);
}

#[test]
fn missing_salary_fails_without_touching_the_table() {
    let mut table = load_employees_str(
        "name,salary,hire date\nAlice,6000,2010-03-15\nBob,,2001-07-01\n",
    )
    .unwrap();
    let before = table.clone();
    let err = derive::derive(&mut table, &high_salary(Strategy::ThresholdCompare)).unwrap_err();
    match err {
        Error::Derivation { rule, row, .. } => {
            assert_eq!(rule, "high salary");
            assert_eq!(row, Some(2));
        }
        other => panic!("expected derivation error, got {other:?}"),
    }
    assert_eq!(table, before);
}

#[test]
fn unknown_source_column_is_a_schema_error() {
    let mut table = employees();
    let rule = DerivationRule::threshold(
        "rich",
        ThresholdRule::new("bonus", 1.0),
        Strategy::Comprehension,
    );
    assert!(matches!(
        derive::derive(&mut table, &rule),
        Err(Error::Schema(_))
    ));
}

#[test]
fn vacation_days_follow_tenure_tiers() {
    let mut table = employees();
    let rule = DerivationRule::tenure(
        "vacation days",
        TenureRule::vacation_days("hire date", as_of()),
    );
    derive::derive(&mut table, &rule).unwrap();
    assert_eq!(labels(&table, "vacation days"), vec!["10", "25", "20"]);
    assert_eq!(
        table.column("vacation days").unwrap().datatype,
        ColumnType::Integer
    );
}

#[test]
fn exactly_twenty_years_earns_the_top_tier() {
    let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let csv = "name,salary,hire date\n\
               Twenty,1,2004-01-01\n\
               Almost,1,2004-01-02\n\
               New,1,2023-12-31\n";
    let mut table = load_employees_str(csv).unwrap();
    let rule = DerivationRule::tenure("vacation days", TenureRule::vacation_days("hire date", as_of));
    derive::derive(&mut table, &rule).unwrap();
    assert_eq!(labels(&table, "vacation days"), vec!["25", "20", "10"]);
}

#[test]
fn tenure_rule_rejects_threshold_strategies() {
    let mut table = employees();
    let rule = DerivationRule::tenure("vacation days", TenureRule::vacation_days("hire date", as_of()))
        .with_strategy(Strategy::ThresholdCompare);
    assert!(matches!(
        derive::derive(&mut table, &rule),
        Err(Error::Derivation { row: None, .. })
    ));
}

#[test]
fn expression_rule_sees_normalized_names() {
    let mut table = employees();
    let rule = DerivationRule::expression("monthly", "salary / 12.0", as_of());
    derive::derive(&mut table, &rule).unwrap();
    assert_eq!(table.column("monthly").unwrap().datatype, ColumnType::Float);
    let idx = table.column_index("monthly").unwrap();
    let first = table.column_values(idx).next().flatten().cloned();
    assert_eq!(first, Some(Value::Float(500.0)));
}

#[test]
fn custom_rule_reports_failing_row() {
    let mut table = employees();
    let rule = DerivationRule::custom("initial", ColumnType::String, |record| {
        match record.get("name") {
            Some(Value::String(name)) if name.starts_with('C') => Err("no C names".to_string()),
            Some(Value::String(name)) => Ok(name.chars().next().map(|c| Value::String(c.to_string()))),
            _ => Ok(None),
        }
    });
    let err = derive::derive(&mut table, &rule).unwrap_err();
    assert!(matches!(err, Error::Derivation { row: Some(3), .. }));
    assert!(table.column("initial").is_none());
}

fn salary_table(salaries: &[i64]) -> Table {
    let mut table = Table::new(vec![Column::new("salary", ColumnType::Integer)]);
    for salary in salaries {
        table.push_row(vec![Some(Value::Integer(*salary))]).unwrap();
    }
    table
}

proptest! {
    #[test]
    fn threshold_strategies_agree(
        salaries in prop::collection::vec(0i64..20_000, 0..40),
        threshold in 0i64..20_000,
    ) {
        let table = salary_table(&salaries);
        let rule = ThresholdRule::new("salary", threshold as f64);
        let results = [Strategy::ThresholdCompare, Strategy::Comprehension, Strategy::RowFunction]
            .map(|strategy| {
                derive::compute(&table, &DerivationRule::threshold("flag", rule.clone(), strategy))
                    .unwrap()
            });
        prop_assert_eq!(&results[0], &results[1]);
        prop_assert_eq!(&results[0], &results[2]);
    }
}

#[test]
fn mixed_type_expression_is_rejected_at_first_mismatch() {
    let mut table = employees();
    let before = table.clone();
    let rule = DerivationRule::expression("band", r#"if(salary > 6500, "hi", 1)"#, as_of());
    match derive::derive(&mut table, &rule).unwrap_err() {
        Error::Derivation { rule, row, message } => {
            assert_eq!(rule, "band");
            assert_eq!(row, Some(2));
            assert!(message.contains("integer"), "{message}");
        }
        other => panic!("expected derivation error, got {other:?}"),
    }
    assert_eq!(table, before);
}

#[test]
fn custom_rule_must_match_declared_type() {
    let mut table = employees();
    let rule = DerivationRule::custom("flag", ColumnType::Boolean, |_| {
        Ok(Some(Value::String("yes".to_string())))
    });
    assert!(matches!(
        derive::derive(&mut table, &rule),
        Err(Error::Derivation { row: Some(1), .. })
    ));
    assert!(table.column("flag").is_none());
}

#[test]
fn empty_hire_date_fails_tenure_rule_without_touching_the_table() {
    let mut table = load_employees_str(
        "name,salary,hire date\nAlice,6000,2010-03-15\nBob,7000,\n",
    )
    .unwrap();
    let before = table.clone();
    let rule = DerivationRule::tenure(
        "vacation days",
        TenureRule::vacation_days("hire date", as_of()),
    );
    match derive::derive(&mut table, &rule).unwrap_err() {
        Error::Derivation { rule, row, message } => {
            assert_eq!(rule, "vacation days");
            assert_eq!(row, Some(2));
            assert!(message.contains("hire date"), "{message}");
        }
        other => panic!("expected derivation error, got {other:?}"),
    }
    assert_eq!(table, before);
}
