//! Range and divisibility operators.

use serde_json::Value;

use super::{defined, numeric_pair, OperatorEnv, OperatorFn};

const FLOAT_TOLERANCE: f64 = 1e-9;

pub(super) const OPERATORS: &[(&str, OperatorFn)] = &[("between", between), ("modulo", modulo)];

/// Inclusive range test. Operand is `[min, max]` or `{min, max}`.
fn between(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    let Some(value) = defined(actual).and_then(Value::as_f64) else {
        return false;
    };
    let Some((min, max)) = numeric_pair(expected, "min", "max") else {
        return false;
    };
    value >= min && value <= max
}

/// `actual mod divisor == remainder`, using floored modulo so the result
/// takes the sign of the divisor. Operand is `[divisor, remainder]` or
/// `{divisor, remainder}`.
fn modulo(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    let Some(value) = defined(actual).filter(|v| v.is_number()) else {
        return false;
    };

    if let Some((a, d, r)) = integer_operands(value, expected) {
        if d == 0 {
            return false;
        }
        return ((a % d) + d) % d == r;
    }

    let Some(a) = value.as_f64() else {
        return false;
    };
    let Some((d, r)) = numeric_pair(expected, "divisor", "remainder") else {
        return false;
    };
    if d == 0.0 || !d.is_finite() || !a.is_finite() {
        return false;
    }
    let rem = a - d * (a / d).floor();
    (rem - r).abs() <= FLOAT_TOLERANCE
}

fn integer_operands(actual: &Value, expected: &Value) -> Option<(i128, i128, i128)> {
    let int = |v: &Value| v.as_i64().map(i128::from).or_else(|| v.as_u64().map(i128::from));
    let (d, r) = match expected {
        Value::Array(items) if items.len() == 2 => (int(&items[0])?, int(&items[1])?),
        Value::Object(map) => (int(map.get("divisor")?)?, int(map.get("remainder")?)?),
        _ => return None,
    };
    Some((int(actual)?, d, r))
}
