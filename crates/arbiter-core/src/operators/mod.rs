//! Operator registry.
//!
//! Every `field` condition names an operator. The registry maps that name to
//! an implementation: either a pure function of `(actual, expected, env)` or
//! the enrichment seam used by `fetch_from_api`. The built-in registry is
//! built once and shared; callers that need extra operators clone it and
//! register their own pure functions.
//!
//! Operators never panic or return errors. Malformed input of any kind
//! degrades to `false`.

mod collection;
mod comparison;
mod geo;
mod numeric;
mod temporal;
mod text;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde_json::Value;

pub use geo::{haversine_km, parse_coordinate, Coordinate, EARTH_RADIUS_KM};
pub use temporal::parse_datetime;

/// Name of the one side-effecting operator.
pub const FETCH_FROM_API: &str = "fetch_from_api";

/// Operators that are valid without a `value` operand.
pub const VALUELESS_OPERATORS: &[&str] = &["present", "blank"];

/// Signature of a pure operator.
///
/// `actual` is `None` when the field path did not resolve.
pub type OperatorFn = fn(actual: Option<&Value>, expected: &Value, env: &OperatorEnv) -> bool;

/// Ambient inputs an operator may read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatorEnv {
    /// Reference instant for relative temporal operators (`within_days`).
    pub now: DateTime<Utc>,
}

impl OperatorEnv {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Default for OperatorEnv {
    fn default() -> Self {
        Self { now: Utc::now() }
    }
}

/// How an operator is executed.
#[derive(Clone, Copy)]
pub enum OperatorImpl {
    /// Pure function of the condition and the context.
    Pure(OperatorFn),

    /// Delegates to the injected enrichment collaborator.
    Enrichment,
}

impl fmt::Debug for OperatorImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorImpl::Pure(_) => f.write_str("Pure"),
            OperatorImpl::Enrichment => f.write_str("Enrichment"),
        }
    }
}

lazy_static! {
    static ref BUILTIN: Arc<OperatorRegistry> = Arc::new(OperatorRegistry::with_builtins());
}

/// Mapping from operator name to implementation.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, OperatorImpl>,
}

impl OperatorRegistry {
    /// Registry with no operators at all.
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// The shared built-in registry.
    pub fn builtin() -> &'static OperatorRegistry {
        &BUILTIN
    }

    /// A shared handle to the built-in registry.
    pub fn shared() -> Arc<OperatorRegistry> {
        Arc::clone(&BUILTIN)
    }

    fn with_builtins() -> Self {
        let mut registry = Self::empty();

        let families = [
            comparison::OPERATORS,
            text::OPERATORS,
            numeric::OPERATORS,
            temporal::OPERATORS,
            collection::OPERATORS,
            geo::OPERATORS,
        ];
        for family in families {
            for (name, function) in family {
                registry
                    .operators
                    .insert((*name).to_string(), OperatorImpl::Pure(*function));
            }
        }

        registry
            .operators
            .insert(FETCH_FROM_API.to_string(), OperatorImpl::Enrichment);

        registry
    }

    /// Register a pure operator, returning the implementation it replaced.
    pub fn register(&mut self, name: impl Into<String>, function: OperatorFn) -> Option<OperatorImpl> {
        self.operators
            .insert(name.into(), OperatorImpl::Pure(function))
    }

    /// Look up an operator by name.
    pub fn get(&self, name: &str) -> Option<OperatorImpl> {
        self.operators.get(name).copied()
    }

    /// Whether `name` is a known operator.
    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// All registered operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether a condition using `name` must carry a `value`.
    pub fn requires_value(name: &str) -> bool {
        !VALUELESS_OPERATORS.contains(&name)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

/// Missing fields and explicit nulls are treated identically.
pub(crate) fn is_missing(actual: Option<&Value>) -> bool {
    matches!(actual, None | Some(Value::Null))
}

/// `Some` only for non-null values.
pub(crate) fn defined(actual: Option<&Value>) -> Option<&Value> {
    actual.filter(|v| !v.is_null())
}

/// Read a numeric operand out of either a two-element array or an object
/// with the given keys.
pub(crate) fn numeric_pair(value: &Value, first: &str, second: &str) -> Option<(f64, f64)> {
    match value {
        Value::Array(items) if items.len() == 2 => Some((items[0].as_f64()?, items[1].as_f64()?)),
        Value::Object(map) => Some((map.get(first)?.as_f64()?, map.get(second)?.as_f64()?)),
        _ => None,
    }
}
