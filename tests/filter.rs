mod common;

use common::{as_of, employees};
use csv_enrich::{
    data::Value,
    derive::{self, DerivationRule, Strategy, ThresholdRule},
    error::Error,
    filter::{FilterPredicate, filter},
    table::Table,
};

fn enriched() -> Table {
    let mut table = employees();
    derive::derive(
        &mut table,
        &DerivationRule::threshold(
            "high salary",
            ThresholdRule::new("salary", 7000.0),
            Strategy::ThresholdCompare,
        ),
    )
    .unwrap();
    table
}

fn names(table: &Table) -> Vec<String> {
    table
        .records()
        .filter_map(|record| record.get("name").map(Value::as_display))
        .collect()
}

#[test]
fn keeps_matching_rows_in_order() {
    let table = enriched();
    let predicate = FilterPredicate::parse(&["high salary == yes"]).unwrap();
    let kept = filter(&table, &predicate).unwrap();
    assert_eq!(names(&kept), vec!["Bob", "Carla"]);
    assert_eq!(kept.headers(), table.headers());
}

#[test]
fn input_table_is_left_untouched() {
    let table = enriched();
    let before = table.clone();
    let predicate = FilterPredicate::parse(&["salary < 7000"]).unwrap();
    let kept = filter(&table, &predicate).unwrap();
    assert_eq!(names(&kept), vec!["Alice"]);
    assert_eq!(table, before);
}

#[test]
fn no_matches_yields_empty_table_with_columns() {
    let table = enriched();
    let predicate = FilterPredicate::parse(&["salary > 100000"]).unwrap();
    let kept = filter(&table, &predicate).unwrap();
    assert!(kept.is_empty());
    assert_eq!(kept.columns().len(), 4);
}

#[test]
fn conditions_are_combined_with_and() {
    let table = enriched();
    let predicate =
        FilterPredicate::parse(&["high salary = yes", "hire date >= 2005-01-01"]).unwrap();
    assert_eq!(names(&filter(&table, &predicate).unwrap()), vec!["Carla"]);
}

#[test]
fn unknown_column_is_a_schema_error() {
    let table = enriched();
    let predicate = FilterPredicate::parse(&["bonus == 1"]).unwrap();
    assert!(matches!(filter(&table, &predicate), Err(Error::Schema(_))));
}

#[test]
fn expression_predicate_uses_normalized_names() {
    let table = enriched();
    let predicate = FilterPredicate::Expression {
        expression: r#"high_salary == "yes" && salary > 8000"#.to_string(),
        as_of: as_of(),
    };
    assert_eq!(names(&filter(&table, &predicate).unwrap()), vec!["Carla"]);
}

#[test]
fn custom_predicate_sees_every_record() {
    let table = enriched();
    let predicate = FilterPredicate::custom(|record| {
        matches!(record.get("name"), Some(Value::String(name)) if name.len() == 3)
    });
    assert_eq!(names(&filter(&table, &predicate).unwrap()), vec!["Bob"]);
}

#[test]
fn text_operators_match_substrings() {
    let table = enriched();
    let predicate = FilterPredicate::parse(&["name contains ar"]).unwrap();
    assert_eq!(names(&filter(&table, &predicate).unwrap()), vec!["Carla"]);
}
