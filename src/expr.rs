//! `evalexpr` contexts for expression derivations and filter predicates.
//!
//! Every column of the record is bound twice: under its normalized name
//! (`hire date` becomes `hire_date`) and under its position (`c0`, `c1`, ...).
//! `row_number` (1-based) and `as_of` are bound as well.

use chrono::{Duration, NaiveDate};
use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, Function, HashMapContext,
    Value as EvalValue, eval_with_context,
};

use crate::{
    data::{Value, evalexpr_to_value, normalize_column_name, parse_naive_date, value_to_evalexpr},
    derive::tenure_years,
    table::Record,
};

fn register_temporal_functions(context: &mut HashMapContext) -> Result<(), String> {
    context
        .set_function(
            "date_add".into(),
            Function::new(|arguments| {
                let args = expect_args(arguments, 2, "date_add")?;
                let date = parse_date_arg(&args[0])?;
                let days = parse_i64_arg(&args[1], "days")?;
                let result = date
                    .checked_add_signed(Duration::days(days))
                    .ok_or_else(|| eval_error("date_add overflow"))?;
                Ok(EvalValue::String(result.format("%Y-%m-%d").to_string()))
            }),
        )
        .map_err(|err| err.to_string())?;

    context
        .set_function(
            "date_diff_days".into(),
            Function::new(|arguments| {
                let args = expect_args(arguments, 2, "date_diff_days")?;
                let end = parse_date_arg(&args[0])?;
                let start = parse_date_arg(&args[1])?;
                Ok(EvalValue::Int((end - start).num_days()))
            }),
        )
        .map_err(|err| err.to_string())?;

    context
        .set_function(
            "tenure_years".into(),
            Function::new(|arguments| {
                let args = expect_args(arguments, 2, "tenure_years")?;
                let hired = parse_date_arg(&args[0])?;
                let as_of = parse_date_arg(&args[1])?;
                Ok(EvalValue::Float(tenure_years(hired, as_of)))
            }),
        )
        .map_err(|err| err.to_string())?;

    Ok(())
}

fn register_string_functions(context: &mut HashMapContext) -> Result<(), String> {
    for (name, op) in [
        ("lowercase", str::to_lowercase as fn(&str) -> String),
        ("uppercase", str::to_uppercase),
        ("trim", |value: &str| value.trim().to_string()),
    ] {
        context
            .set_function(
                name.into(),
                Function::new(move |arguments| {
                    let args = expect_args(arguments, 1, name)?;
                    let value = expect_string(&args[0], "value")?;
                    Ok(EvalValue::String(op(value)))
                }),
            )
            .map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn expect_args(
    arguments: &EvalValue,
    expected: usize,
    name: &str,
) -> Result<Vec<EvalValue>, evalexpr::EvalexprError> {
    match arguments {
        value if expected == 1 && !matches!(value, EvalValue::Tuple(_)) => Ok(vec![value.clone()]),
        EvalValue::Tuple(values) => {
            if values.len() != expected {
                return Err(evalexpr::EvalexprError::wrong_function_argument_amount(
                    values.len(),
                    expected,
                ));
            }
            Ok(values.clone())
        }
        _ => Err(eval_error(&format!(
            "{name} expects {expected} arguments provided as a tuple"
        ))),
    }
}

fn eval_error(message: &str) -> evalexpr::EvalexprError {
    evalexpr::EvalexprError::CustomMessage(message.to_string())
}

fn parse_date_arg(value: &EvalValue) -> Result<NaiveDate, evalexpr::EvalexprError> {
    let raw = expect_string(value, "date")?;
    parse_naive_date(raw, None).map_err(|err| eval_error(&err))
}

fn parse_i64_arg(value: &EvalValue, name: &str) -> Result<i64, evalexpr::EvalexprError> {
    match value {
        EvalValue::Int(i) => Ok(*i),
        EvalValue::Float(f) => Ok(*f as i64),
        other => Err(eval_error(&format!(
            "Expected integer for {name}, got {other:?}"
        ))),
    }
}

fn expect_string<'a>(value: &'a EvalValue, name: &str) -> Result<&'a str, evalexpr::EvalexprError> {
    if let EvalValue::String(s) = value {
        Ok(s)
    } else {
        Err(eval_error(&format!("Expected string for {name}")))
    }
}

pub fn build_context(record: &Record<'_>, as_of: NaiveDate) -> Result<HashMapContext, String> {
    let mut context = HashMapContext::new();
    register_temporal_functions(&mut context)?;
    register_string_functions(&mut context)?;
    for (idx, (name, value)) in record.iter().enumerate() {
        let Some(value) = value else {
            continue;
        };
        let eval_value = value_to_evalexpr(value);
        context
            .set_value(normalize_column_name(name), eval_value.clone())
            .map_err(|err| format!("Binding column '{name}': {err}"))?;
        context
            .set_value(format!("c{idx}"), eval_value)
            .map_err(|err| format!("Binding column index {idx}: {err}"))?;
    }
    context
        .set_value(
            "row_number".to_string(),
            EvalValue::Int(record.index() as i64 + 1),
        )
        .map_err(|err| format!("Binding row_number: {err}"))?;
    context
        .set_value(
            "as_of".to_string(),
            EvalValue::String(as_of.format("%Y-%m-%d").to_string()),
        )
        .map_err(|err| format!("Binding as_of: {err}"))?;
    Ok(context)
}

pub fn evaluate_to_value(expression: &str, context: &HashMapContext) -> Result<Option<Value>, String> {
    let result = eval_with_context(expression, context)
        .map_err(|err| format!("Evaluating expression '{expression}': {err}"))?;
    Ok(evalexpr_to_value(result))
}

pub fn evaluate_to_bool(expression: &str, context: &HashMapContext) -> Result<bool, String> {
    let result = eval_with_context(expression, context)
        .map_err(|err| format!("Evaluating expression '{expression}': {err}"))?;
    Ok(eval_value_truthy(result))
}

pub fn eval_value_truthy(value: EvalValue) -> bool {
    match value {
        EvalValue::Boolean(b) => b,
        EvalValue::Int(i) => i != 0,
        EvalValue::Float(f) => f != 0.0,
        EvalValue::String(s) => !s.is_empty(),
        EvalValue::Tuple(values) => values.into_iter().any(eval_value_truthy),
        EvalValue::Empty => false,
    }
}
