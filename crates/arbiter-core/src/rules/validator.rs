//! Rule-set document validation.
//!
//! Validation never stops at the first problem: every violation in the
//! document is collected in one pass, each tagged with the JSON path it was
//! found at. A document that validates cleanly is turned into a [`RuleSet`]
//! by the same pass, so the evaluator only ever sees well-formed trees.
//!
//! Unsupported operators are rejected here. This is the gate that keeps rule
//! data from reaching the evaluator with behaviour nobody registered.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::model::{Condition, FieldCondition, Rule, RuleSet};
use crate::operators::OperatorRegistry;

const CONDITION_KINDS: [&str; 3] = ["field", "all", "any"];

/// A single violation found in a rule-set document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Location in the document, e.g. `rules[1].if.all[0].op`.
    pub path: String,

    /// What is wrong at that location.
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "document: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every violation found in one document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rule set validation failed with {} error(s): {}", .0.len(), join_errors(.0))]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates rule-set documents against a set of known operators.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    registry: &'r OperatorRegistry,
}

impl Validator<'static> {
    /// Validator accepting the built-in operators.
    pub fn new() -> Self {
        Self {
            registry: OperatorRegistry::builtin(),
        }
    }
}

impl Default for Validator<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Validator<'r> {
    /// Validator accepting every operator in `registry`.
    pub fn with_registry(registry: &'r OperatorRegistry) -> Self {
        Self { registry }
    }

    /// Collect every violation in `document`. Empty means valid.
    pub fn validate(&self, document: &Value) -> Vec<ValidationError> {
        match self.build(document) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.into_inner(),
        }
    }

    /// Fail-fast form: all violations wrapped in a single error.
    pub fn validate_strict(&self, document: &Value) -> Result<(), ValidationErrors> {
        self.build(document).map(|_| ())
    }

    /// Validate and build in one pass.
    pub(crate) fn build(&self, document: &Value) -> Result<RuleSet, ValidationErrors> {
        let mut errors = Vec::new();

        let Some(root) = document.as_object() else {
            return Err(ValidationErrors(vec![ValidationError::new(
                "",
                "rule set must be a JSON object",
            )]));
        };

        let version = self.check_version(root, &mut errors);

        let mut rules = Vec::new();
        match root.get("rules") {
            None => errors.push(ValidationError::new("rules", "is required")),
            Some(Value::Array(items)) => {
                let mut seen_ids = HashSet::new();
                for (index, item) in items.iter().enumerate() {
                    let path = format!("rules[{}]", index);
                    if let Some(rule) = self.check_rule(item, &path, &mut seen_ids, &mut errors) {
                        rules.push(rule);
                    }
                }
            }
            Some(_) => errors.push(ValidationError::new("rules", "must be an array")),
        }

        match version {
            Some(version) if errors.is_empty() => Ok(RuleSet::new(version, rules)),
            _ => Err(ValidationErrors(errors)),
        }
    }

    /// Validate and build a standalone condition tree.
    pub(crate) fn condition(&self, value: &Value) -> Result<Condition, ValidationErrors> {
        let mut errors = Vec::new();
        match self.check_condition(value, "", &mut errors) {
            Some(condition) if errors.is_empty() => Ok(condition),
            _ => Err(ValidationErrors(errors)),
        }
    }

    fn check_version(&self, root: &Map<String, Value>, errors: &mut Vec<ValidationError>) -> Option<String> {
        match root.get("version") {
            None | Some(Value::Null) => {
                errors.push(ValidationError::new("version", "is required"));
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                errors.push(ValidationError::new("version", "must not be empty"));
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                errors.push(ValidationError::new("version", "must be a string"));
                None
            }
        }
    }

    fn check_rule(
        &self,
        value: &Value,
        path: &str,
        seen_ids: &mut HashSet<String>,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Rule> {
        let Some(rule) = value.as_object() else {
            errors.push(ValidationError::new(path, "rule must be an object"));
            return None;
        };
        let errors_before = errors.len();

        let id = match rule.get("id") {
            None | Some(Value::Null) => {
                errors.push(ValidationError::new(format!("{}.id", path), "is required"));
                None
            }
            Some(Value::String(id)) if id.is_empty() => {
                errors.push(ValidationError::new(format!("{}.id", path), "must not be empty"));
                None
            }
            Some(Value::String(id)) => {
                if !seen_ids.insert(id.clone()) {
                    errors.push(ValidationError::new(
                        format!("{}.id", path),
                        format!("duplicate rule id '{}'", id),
                    ));
                }
                Some(id.clone())
            }
            Some(_) => {
                errors.push(ValidationError::new(format!("{}.id", path), "must be a string"));
                None
            }
        };

        let condition = match rule.get("if") {
            None | Some(Value::Null) => {
                errors.push(ValidationError::new(format!("{}.if", path), "is required"));
                None
            }
            Some(condition) => self.check_condition(condition, &format!("{}.if", path), errors),
        };

        let consequence = match rule.get("then") {
            None | Some(Value::Null) => {
                errors.push(ValidationError::new(format!("{}.then", path), "is required"));
                None
            }
            Some(Value::Object(then)) => self.check_then(then, &format!("{}.then", path), errors),
            Some(_) => {
                errors.push(ValidationError::new(format!("{}.then", path), "must be an object"));
                None
            }
        };

        if errors.len() != errors_before {
            return None;
        }
        let (decision, weight, reason) = consequence?;
        Some(Rule::new(id?, condition?, decision, weight, reason))
    }

    fn check_then(
        &self,
        then: &Map<String, Value>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<(String, f64, Option<String>)> {
        let errors_before = errors.len();

        let decision = match then.get("decision") {
            None | Some(Value::Null) => {
                errors.push(ValidationError::new(format!("{}.decision", path), "is required"));
                None
            }
            Some(Value::String(d)) if d.is_empty() => {
                errors.push(ValidationError::new(format!("{}.decision", path), "must not be empty"));
                None
            }
            Some(Value::String(d)) => Some(d.clone()),
            Some(_) => {
                errors.push(ValidationError::new(format!("{}.decision", path), "must be a string"));
                None
            }
        };

        let weight = match then.get("weight") {
            None | Some(Value::Null) => 1.0,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(w) if (0.0..=1.0).contains(&w) => w,
                _ => {
                    errors.push(ValidationError::new(
                        format!("{}.weight", path),
                        format!("must be between 0 and 1, got {}", n),
                    ));
                    1.0
                }
            },
            Some(_) => {
                errors.push(ValidationError::new(format!("{}.weight", path), "must be a number"));
                1.0
            }
        };

        let reason = match then.get("reason") {
            None | Some(Value::Null) => None,
            Some(Value::String(r)) => Some(r.clone()),
            Some(_) => {
                errors.push(ValidationError::new(format!("{}.reason", path), "must be a string"));
                None
            }
        };

        if errors.len() != errors_before {
            return None;
        }
        Some((decision?, weight, reason))
    }

    fn check_condition(&self, value: &Value, path: &str, errors: &mut Vec<ValidationError>) -> Option<Condition> {
        let location = if path.is_empty() { "condition" } else { path };

        let Some(condition) = value.as_object() else {
            errors.push(ValidationError::new(location, "condition must be an object"));
            return None;
        };

        let kinds: Vec<&str> = CONDITION_KINDS
            .into_iter()
            .filter(|kind| condition.contains_key(*kind))
            .collect();

        match kinds.as_slice() {
            [] => {
                errors.push(ValidationError::new(
                    location,
                    "condition must have exactly one of 'field', 'all' or 'any'",
                ));
                None
            }
            ["field"] => self.check_field(condition, path, errors),
            [group] => {
                let group_path = join_path(path, group);
                let children = self.check_group(&condition[*group], &group_path, errors)?;
                Some(if *group == "all" {
                    Condition::All(children)
                } else {
                    Condition::Any(children)
                })
            }
            _ => {
                errors.push(ValidationError::new(
                    location,
                    format!(
                        "condition must have exactly one of 'field', 'all' or 'any', found {}",
                        kinds.join(", ")
                    ),
                ));
                None
            }
        }
    }

    fn check_group(&self, value: &Value, path: &str, errors: &mut Vec<ValidationError>) -> Option<Vec<Condition>> {
        let Some(items) = value.as_array() else {
            errors.push(ValidationError::new(path, "must be an array of conditions"));
            return None;
        };

        let mut children = Vec::with_capacity(items.len());
        let mut complete = true;
        for (index, item) in items.iter().enumerate() {
            match self.check_condition(item, &format!("{}[{}]", path, index), errors) {
                Some(child) => children.push(child),
                None => complete = false,
            }
        }

        complete.then_some(children)
    }

    fn check_field(
        &self,
        condition: &Map<String, Value>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<Condition> {
        let field_path = join_path(path, "field");
        let field = match &condition["field"] {
            Value::String(field) if field.is_empty() || field.split('.').any(str::is_empty) => {
                errors.push(ValidationError::new(
                    field_path,
                    format!("'{}' is not a valid dot path (empty segment)", field),
                ));
                None
            }
            Value::String(field) => Some(field.clone()),
            _ => {
                errors.push(ValidationError::new(field_path, "must be a string"));
                None
            }
        };

        let op_path = join_path(path, "op");
        let op = match condition.get("op") {
            None | Some(Value::Null) => {
                errors.push(ValidationError::new(op_path, "is required"));
                None
            }
            Some(Value::String(op)) if self.registry.contains(op) => Some(op.clone()),
            Some(Value::String(op)) => {
                errors.push(ValidationError::new(
                    op_path,
                    format!(
                        "unsupported operator '{}' (expected one of: {})",
                        op,
                        self.registry.names().join(", ")
                    ),
                ));
                None
            }
            Some(_) => {
                errors.push(ValidationError::new(op_path, "must be a string"));
                None
            }
        };

        let value = condition.get("value");
        if let Some(op) = &op {
            if value.is_none() && OperatorRegistry::requires_value(op) {
                errors.push(ValidationError::new(
                    join_path(path, "value"),
                    format!("is required for operator '{}'", op),
                ));
                return None;
            }
        }

        Some(Condition::Field(FieldCondition {
            field: field?,
            op: op?,
            value: value.cloned().unwrap_or(Value::Null),
        }))
    }
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}
