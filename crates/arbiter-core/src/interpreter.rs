//! Boolean evaluation of condition trees.
//!
//! Evaluation is fail-safe: nothing in here returns an error or panics on
//! request data. Anything that cannot be evaluated (unknown operator,
//! malformed operand, missing field, failed enrichment) makes that one
//! condition `false`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::Context;
use crate::enrichment::Enrichment;
use crate::operators::{OperatorEnv, OperatorImpl, OperatorRegistry};
use crate::rules::{Condition, FieldCondition};
use crate::trace::ConditionTrace;

lazy_static! {
    static ref TEMPLATE: Regex = Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("valid template pattern");
}

/// Evaluates [`Condition`] trees against a [`Context`].
///
/// Cheap to clone; the registry and enrichment collaborator are shared.
#[derive(Clone)]
pub struct ConditionEvaluator {
    registry: Arc<OperatorRegistry>,
    enrichment: Option<Arc<dyn Enrichment>>,
    clock: Option<DateTime<Utc>>,
}

impl ConditionEvaluator {
    /// Evaluator over the built-in operators, without enrichment.
    pub fn new() -> Self {
        Self {
            registry: OperatorRegistry::shared(),
            enrichment: None,
            clock: None,
        }
    }

    /// Use a custom operator registry.
    pub fn with_registry(mut self, registry: Arc<OperatorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Wire the collaborator behind `fetch_from_api`.
    pub fn with_enrichment(mut self, enrichment: Arc<dyn Enrichment>) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    /// Pin "now" for temporal operators instead of reading the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Evaluate `condition` against `context`.
    pub fn evaluate(&self, condition: &Condition, context: &Context) -> bool {
        let mut scope = self.scope(context);
        self.eval(condition, &mut scope, None)
    }

    /// Evaluate and append one [`ConditionTrace`] per `field` condition that
    /// was actually evaluated. Short-circuited branches leave no trace.
    pub fn evaluate_traced(&self, condition: &Condition, context: &Context, traces: &mut Vec<ConditionTrace>) -> bool {
        let mut scope = self.scope(context);
        self.eval(condition, &mut scope, Some(traces))
    }

    fn scope<'c>(&self, context: &'c Context) -> Scope<'c> {
        Scope {
            base: context,
            derived: None,
            env: OperatorEnv::new(self.clock.unwrap_or_else(Utc::now)),
        }
    }

    fn eval(&self, condition: &Condition, scope: &mut Scope<'_>, mut traces: Option<&mut Vec<ConditionTrace>>) -> bool {
        match condition {
            Condition::All(children) => {
                for child in children {
                    if !self.eval(child, scope, traces.as_deref_mut()) {
                        return false;
                    }
                }
                true
            }
            Condition::Any(children) => {
                for child in children {
                    if self.eval(child, scope, traces.as_deref_mut()) {
                        return true;
                    }
                }
                false
            }
            Condition::Field(field) => {
                let result = self.eval_field(field, scope);
                if let Some(traces) = traces {
                    let actual = scope.get(&field.field);
                    traces.push(ConditionTrace::new(&field.field, &field.op, &field.value, actual, result));
                }
                result
            }
        }
    }

    fn eval_field(&self, condition: &FieldCondition, scope: &mut Scope<'_>) -> bool {
        match self.registry.get(&condition.op) {
            Some(OperatorImpl::Pure(operator)) => {
                operator(scope.get(&condition.field), &condition.value, &scope.env)
            }
            Some(OperatorImpl::Enrichment) => self.fetch(condition, scope),
            None => {
                debug!(operator = %condition.op, field = %condition.field, "Unknown operator, condition is false");
                false
            }
        }
    }

    /// `fetch_from_api`: call the collaborator and map the response into the
    /// derived context seen by later conditions of the same evaluation.
    fn fetch(&self, condition: &FieldCondition, scope: &mut Scope<'_>) -> bool {
        let Some(enrichment) = &self.enrichment else {
            debug!(field = %condition.field, "fetch_from_api without an enrichment collaborator");
            return false;
        };
        let Some(request) = FetchRequest::parse(&condition.value) else {
            debug!(field = %condition.field, "Malformed fetch_from_api operand");
            return false;
        };
        let Some(params) = interpolate_params(request.params, scope) else {
            debug!(endpoint = %request.endpoint, "fetch_from_api parameter did not resolve");
            return false;
        };

        let response = match enrichment.fetch(request.endpoint, &params) {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %request.endpoint, error = %e, "Enrichment fetch failed");
                return false;
            }
        };

        let mut overlay = Vec::new();
        if let Some(mapping) = request.mapping {
            for (response_field, target) in mapping {
                let Some(target) = target.as_str().filter(|t| !t.is_empty()) else {
                    warn!(endpoint = %request.endpoint, response_field = %response_field, "Mapping target must be a non-empty string");
                    return false;
                };
                let Some(value) = lookup(&response, response_field) else {
                    warn!(endpoint = %request.endpoint, response_field = %response_field, "Response field missing");
                    return false;
                };
                overlay.push((target.to_string(), value.clone()));
            }
        }

        scope.derive(overlay);
        true
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("operators", &self.registry.names().len())
            .field("enrichment", &self.enrichment.is_some())
            .field("clock", &self.clock)
            .finish()
    }
}

/// Per-evaluation view: the request context plus anything enrichment added.
struct Scope<'c> {
    base: &'c Context,
    derived: Option<Context>,
    env: OperatorEnv,
}

impl Scope<'_> {
    fn get(&self, path: &str) -> Option<&Value> {
        self.derived.as_ref().unwrap_or(self.base).get(path)
    }

    fn derive(&mut self, overlay: Vec<(String, Value)>) {
        if overlay.is_empty() {
            return;
        }
        let current = self.derived.as_ref().unwrap_or(self.base);
        self.derived = Some(current.merged(overlay));
    }
}

struct FetchRequest<'a> {
    endpoint: &'a str,
    params: Option<&'a Map<String, Value>>,
    mapping: Option<&'a Map<String, Value>>,
}

impl<'a> FetchRequest<'a> {
    fn parse(operand: &'a Value) -> Option<Self> {
        let operand = operand.as_object()?;
        let endpoint = operand.get("endpoint")?.as_str().filter(|e| !e.is_empty())?;
        Some(Self {
            endpoint,
            params: optional_object(operand.get("params"))?,
            mapping: optional_object(operand.get("mapping"))?,
        })
    }
}

/// `None` for a wrong type, `Some(None)` when absent.
fn optional_object(value: Option<&Value>) -> Option<Option<&Map<String, Value>>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(Value::Object(map)) => Some(Some(map)),
        Some(_) => None,
    }
}

fn interpolate_params(params: Option<&Map<String, Value>>, scope: &Scope<'_>) -> Option<Map<String, Value>> {
    let Some(params) = params else {
        return Some(Map::new());
    };
    params
        .iter()
        .map(|(key, value)| Some((key.clone(), interpolate(value, scope)?)))
        .collect()
}

/// Replace `{{dot.path}}` templates in string values.
///
/// A string that is exactly one template takes the referenced value as-is,
/// keeping its JSON type. Templates embedded in longer strings are rendered
/// as text. Unresolvable paths yield `None`.
fn interpolate(value: &Value, scope: &Scope<'_>) -> Option<Value> {
    let Value::String(text) = value else {
        return Some(value.clone());
    };

    if let Some(captures) = TEMPLATE.captures(text) {
        if captures.get(0).map(|m| m.as_str().len()) == Some(text.len()) {
            return defined(scope.get(&captures[1])).cloned();
        }
    }

    let mut rendered = String::with_capacity(text.len());
    let mut last = 0;
    for captures in TEMPLATE.captures_iter(text) {
        let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        rendered.push_str(&text[last..whole.start()]);
        match defined(scope.get(path.as_str()))? {
            Value::String(s) => rendered.push_str(s),
            other => rendered.push_str(&other.to_string()),
        }
        last = whole.end();
    }
    rendered.push_str(&text[last..]);
    Some(Value::String(rendered))
}

fn defined(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
