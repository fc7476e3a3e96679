//! Rule-set documents: data model, loading and validation.
//!
//! ```yaml
//! version: "2024.1"
//! rules:
//!   - id: prime
//!     if:
//!       all:
//!         - { field: applicant.credit_score, op: gte, value: 720 }
//!         - { field: applicant.email, op: present }
//!     then: { decision: approve, weight: 0.9, reason: Prime applicant }
//! ```

mod model;
mod validator;

pub use model::{Condition, FieldCondition, Rule, RuleSet, RuleSetError};
pub use validator::{ValidationError, ValidationErrors, Validator};
