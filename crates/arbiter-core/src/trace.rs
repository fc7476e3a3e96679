//! Explainability traces.
//!
//! Traces are a reporting side channel: they mirror what the evaluator did
//! but are never read back by it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record of one evaluated `field` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionTrace {
    pub field: String,
    pub operator: String,
    pub expected_value: Value,

    /// `None` when the path did not resolve.
    pub actual_value: Option<Value>,
    pub result: bool,

    /// Human-readable rendering, e.g. `age >= 18`.
    pub description: String,
}

impl ConditionTrace {
    pub fn new(field: &str, operator: &str, expected: &Value, actual: Option<&Value>, result: bool) -> Self {
        Self {
            field: field.to_string(),
            operator: operator.to_string(),
            expected_value: expected.clone(),
            actual_value: actual.cloned(),
            result,
            description: describe(field, operator, expected),
        }
    }
}

/// Record of one rule examined by a rule evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrace {
    pub rule_id: String,
    pub matched: bool,
    pub condition_traces: Vec<ConditionTrace>,
    pub decision: String,
    pub weight: f64,
    pub reason: Option<String>,
}

/// Accumulates rule traces for one decision, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector {
    rules: Vec<RuleTrace>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trace: RuleTrace) {
        self.rules.push(trace);
    }

    pub fn rule_traces(&self) -> &[RuleTrace] {
        &self.rules
    }

    /// Rule traces that matched.
    pub fn matched(&self) -> impl Iterator<Item = &RuleTrace> {
        self.rules.iter().filter(|t| t.matched)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Reset for reuse on the next request.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Move the collected traces out, leaving the collector empty.
    pub fn take(&mut self) -> Vec<RuleTrace> {
        std::mem::take(&mut self.rules)
    }
}

fn describe(field: &str, operator: &str, expected: &Value) -> String {
    let symbol = match operator {
        "eq" => Some("=="),
        "neq" => Some("!="),
        "gt" => Some(">"),
        "gte" => Some(">="),
        "lt" => Some("<"),
        "lte" => Some("<="),
        _ => None,
    };
    if let Some(symbol) = symbol {
        return format!("{} {} {}", field, symbol, render(expected));
    }

    match operator {
        "present" => format!("{} is present", field),
        "blank" => format!("{} is blank", field),
        "in" => format!("{} is one of {}", field, render(expected)),
        "contains" => format!("{} contains {}", field, render(expected)),
        "starts_with" => format!("{} starts with {}", field, render(expected)),
        "ends_with" => format!("{} ends with {}", field, render(expected)),
        "matches" => format!("{} matches /{}/", field, expected.as_str().unwrap_or_default()),
        "between" => match bounds(expected, "min", "max") {
            Some((min, max)) => format!("{} is between {} and {}", field, min, max),
            None => format!("{} is between {}", field, render(expected)),
        },
        "modulo" => match bounds(expected, "divisor", "remainder") {
            Some((divisor, remainder)) => format!("{} mod {} == {}", field, divisor, remainder),
            None => format!("{} modulo {}", field, render(expected)),
        },
        "before_date" => format!("{} is before {}", field, render(expected)),
        "after_date" => format!("{} is after {}", field, render(expected)),
        "within_days" => format!("{} is within {} days of now", field, render(expected)),
        "day_of_week" => format!("{} falls on {}", field, render(expected)),
        "contains_all" => format!("{} contains all of {}", field, render(expected)),
        "contains_any" => format!("{} contains any of {}", field, render(expected)),
        "intersects" => format!("{} intersects {}", field, render(expected)),
        "subset_of" => format!("{} is a subset of {}", field, render(expected)),
        "within_radius" => {
            let radius = expected
                .get("radius_km")
                .or_else(|| expected.get("radius"))
                .map(render)
                .unwrap_or_else(|| "?".to_string());
            let center = expected.get("center").map(render).unwrap_or_else(|| "?".to_string());
            format!("{} is within {} km of {}", field, radius, center)
        }
        "in_polygon" => {
            let vertices = expected.as_array().map(Vec::len).unwrap_or(0);
            format!("{} is inside a polygon of {} vertices", field, vertices)
        }
        "fetch_from_api" => {
            let endpoint = expected.get("endpoint").and_then(Value::as_str).unwrap_or("?");
            format!("fetch {} for {}", endpoint, field)
        }
        other => format!("{} {} {}", field, other, render(expected)),
    }
}

fn bounds(value: &Value, first: &str, second: &str) -> Option<(String, String)> {
    match value {
        Value::Array(items) if items.len() == 2 => Some((render(&items[0]), render(&items[1]))),
        Value::Object(map) => Some((render(map.get(first)?), render(map.get(second)?))),
        _ => None,
    }
}

fn render(value: &Value) -> String {
    value.to_string()
}
