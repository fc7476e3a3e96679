//! Equality, ordering, membership and presence operators.
//!
//! Ordering is type-strict: both sides must share a concrete representation.
//! Integers compare with integers, floats with floats, strings with strings.
//! An integer is never ordered against a float.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::{OperatorEnv, OperatorFn};

pub(super) const OPERATORS: &[(&str, OperatorFn)] = &[
    ("eq", eq),
    ("neq", neq),
    ("gt", gt),
    ("gte", gte),
    ("lt", lt),
    ("lte", lte),
    ("in", is_in),
    ("present", present),
    ("blank", blank),
];

fn eq(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    actual.unwrap_or(&Value::Null) == expected
}

fn neq(actual: Option<&Value>, expected: &Value, env: &OperatorEnv) -> bool {
    !eq(actual, expected, env)
}

fn gt(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    matches!(compare(actual, expected), Some(Ordering::Greater))
}

fn gte(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    matches!(
        compare(actual, expected),
        Some(Ordering::Greater | Ordering::Equal)
    )
}

fn lt(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    matches!(compare(actual, expected), Some(Ordering::Less))
}

fn lte(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal))
}

fn is_in(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    match expected {
        Value::Array(items) => items.contains(actual),
        single => single == actual,
    }
}

fn present(actual: Option<&Value>, _expected: &Value, _env: &OperatorEnv) -> bool {
    match actual {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Number(_) | Value::Bool(_)) => true,
    }
}

fn blank(actual: Option<&Value>, expected: &Value, env: &OperatorEnv) -> bool {
    !present(actual, expected, env)
}

/// Order two values, or `None` when they are not comparable.
fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (integer(a), integer(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (None, None) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}
