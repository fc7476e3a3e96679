//! Rule-set data model and loading from JSON/YAML.

use std::fs;
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

use super::validator::{ValidationErrors, Validator};
use crate::operators::OperatorRegistry;

/// Errors that can occur when loading a rule set.
#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error("Failed to read rule set file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

impl RuleSetError {
    /// The validation errors, when loading failed validation.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            RuleSetError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// A `field` leaf of the condition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    /// Dot path into the context.
    pub field: String,

    /// Operator name, resolved through the operator registry.
    pub op: String,

    /// Raw operand; `Null` for operators that take none.
    pub value: Value,
}

/// Boolean expression tree of the rule language.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// True when every child is true (vacuously true when empty).
    All(Vec<Condition>),

    /// True when some child is true (false when empty).
    Any(Vec<Condition>),

    /// Apply an operator to one context field.
    Field(FieldCondition),
}

impl Condition {
    pub fn field(field: impl Into<String>, op: impl Into<String>, value: Value) -> Self {
        Condition::Field(FieldCondition {
            field: field.into(),
            op: op.into(),
            value,
        })
    }

    pub fn all(children: Vec<Condition>) -> Self {
        Condition::All(children)
    }

    pub fn any(children: Vec<Condition>) -> Self {
        Condition::Any(children)
    }

    /// Parse and validate a condition document against the built-in operators.
    pub fn from_value(value: &Value) -> Result<Self, ValidationErrors> {
        Validator::new().condition(value)
    }

    /// Wire representation of this condition.
    pub fn to_value(&self) -> Value {
        match self {
            Condition::All(children) => json!({ "all": children.iter().map(Condition::to_value).collect::<Vec<_>>() }),
            Condition::Any(children) => json!({ "any": children.iter().map(Condition::to_value).collect::<Vec<_>>() }),
            Condition::Field(f) => {
                if f.value.is_null() && !OperatorRegistry::requires_value(&f.op) {
                    json!({ "field": f.field, "op": f.op })
                } else {
                    json!({ "field": f.field, "op": f.op, "value": f.value })
                }
            }
        }
    }

    /// Number of `field` leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Condition::All(children) | Condition::Any(children) => {
                children.iter().map(Condition::leaf_count).sum()
            }
            Condition::Field(_) => 1,
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// One `(condition, decision, weight, reason)` entry of a rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    id: String,
    condition: Condition,
    decision: String,
    weight: f64,
    reason: Option<String>,
}

impl Rule {
    pub(crate) fn new(
        id: String,
        condition: Condition,
        decision: String,
        weight: f64,
        reason: Option<String>,
    ) -> Self {
        Self {
            id,
            condition,
            decision,
            weight,
            reason,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn decision(&self) -> &str {
        &self.decision
    }

    /// Weight in `[0, 1]`; `1.0` when the document omitted it.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn to_value(&self) -> Value {
        let mut then = json!({ "decision": self.decision, "weight": self.weight });
        if let (Some(reason), Value::Object(map)) = (&self.reason, &mut then) {
            map.insert("reason".to_string(), Value::String(reason.clone()));
        }
        json!({ "id": self.id, "if": self.condition.to_value(), "then": then })
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// An ordered, versioned, validated collection of rules.
///
/// Only obtainable through validation, so every `RuleSet` in existence is
/// well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    version: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub(crate) fn new(version: String, rules: Vec<Rule>) -> Self {
        Self { version, rules }
    }

    /// Validate a JSON document and build a rule set from it.
    pub fn from_value(document: &Value) -> Result<Self, RuleSetError> {
        Ok(Validator::new().build(document)?)
    }

    /// Same as [`RuleSet::from_value`], accepting operators from `registry`.
    pub fn from_value_with(document: &Value, registry: &OperatorRegistry) -> Result<Self, RuleSetError> {
        Ok(Validator::with_registry(registry).build(document)?)
    }

    /// Parse a rule set from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, RuleSetError> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_value(&document)
    }

    /// Parse a rule set from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleSetError> {
        let document: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&document)
    }

    /// Parse a rule set from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a rule set from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn to_value(&self) -> Value {
        json!({
            "version": self.version,
            "rules": self.rules.iter().map(Rule::to_value).collect::<Vec<_>>(),
        })
    }
}

impl Serialize for RuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("version", &self.version)?;
        map.serialize_entry("rules", &self.rules)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOAN_RULES: &str = r#"{
        "version": "2024.1",
        "rules": [
            {
                "id": "prime",
                "if": {"all": [
                    {"field": "applicant.credit_score", "op": "gte", "value": 720},
                    {"field": "applicant.email", "op": "present"}
                ]},
                "then": {"decision": "approve", "weight": 0.9, "reason": "Prime applicant"}
            },
            {
                "id": "fallback",
                "if": {"any": []},
                "then": {"decision": "review"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_valid_rule_set() {
        let rule_set = RuleSet::from_json(LOAN_RULES).unwrap();
        assert_eq!(rule_set.version(), "2024.1");
        assert_eq!(rule_set.len(), 2);

        let prime = rule_set.rule("prime").unwrap();
        assert_eq!(prime.decision(), "approve");
        assert_eq!(prime.weight(), 0.9);
        assert_eq!(prime.reason(), Some("Prime applicant"));
        assert_eq!(prime.condition().leaf_count(), 2);
    }

    #[test]
    fn test_weight_defaults_to_one() {
        let rule_set = RuleSet::from_json(LOAN_RULES).unwrap();
        assert_eq!(rule_set.rule("fallback").unwrap().weight(), 1.0);
        assert_eq!(rule_set.rule("fallback").unwrap().reason(), None);
    }

    #[test]
    fn test_round_trip_through_wire_format() {
        let rule_set = RuleSet::from_json(LOAN_RULES).unwrap();
        let reparsed = RuleSet::from_value(&rule_set.to_value()).unwrap();
        assert_eq!(rule_set, reparsed);
        assert_eq!(serde_json::to_value(&rule_set).unwrap(), rule_set.to_value());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
version: "1"
rules:
  - id: adult
    if:
      field: age
      op: gte
      value: 18
    then:
      decision: allow
      weight: 0.5
"#;
        let rule_set = RuleSet::from_yaml(yaml).unwrap();
        assert_eq!(rule_set.rules()[0].id(), "adult");
        assert_eq!(
            rule_set.rules()[0].condition(),
            &Condition::field("age", "gte", serde_json::json!(18))
        );
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        let result = RuleSet::from_json(r#"{"rules": {}}"#);
        let errors = result.as_ref().unwrap_err().validation_errors().unwrap();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(RuleSet::from_json("{not json"), Err(RuleSetError::Json(_))));
    }

    #[test]
    fn test_condition_to_value_omits_null_for_presence_ops() {
        let condition = Condition::field("email", "present", Value::Null);
        assert_eq!(condition.to_value(), json!({"field": "email", "op": "present"}));

        let eq_null = Condition::field("email", "eq", Value::Null);
        assert_eq!(
            eq_null.to_value(),
            json!({"field": "email", "op": "eq", "value": null})
        );
    }
}
