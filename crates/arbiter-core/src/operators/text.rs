//! String operators. Both sides must be strings.

use std::collections::HashMap;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use super::{OperatorEnv, OperatorFn};

/// Upper bound on compiled pattern size, so rule data cannot request an
/// arbitrarily large automaton.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Distinct `matches` patterns kept compiled. The cache is emptied when full.
const PATTERN_CACHE_CAPACITY: usize = 512;

lazy_static! {
    /// Compiled `matches` operands keyed by pattern source. Invalid patterns
    /// are stored as `None` so they are not recompiled either.
    static ref PATTERNS: RwLock<HashMap<String, Option<Regex>>> = RwLock::new(HashMap::new());
}

pub(super) const OPERATORS: &[(&str, OperatorFn)] = &[
    ("contains", contains),
    ("starts_with", starts_with),
    ("ends_with", ends_with),
    ("matches", matches),
];

fn strings<'a>(actual: Option<&'a Value>, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((actual?.as_str()?, expected.as_str()?))
}

fn contains(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    strings(actual, expected).is_some_and(|(a, e)| a.contains(e))
}

fn starts_with(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    strings(actual, expected).is_some_and(|(a, e)| a.starts_with(e))
}

fn ends_with(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    strings(actual, expected).is_some_and(|(a, e)| a.ends_with(e))
}

fn matches(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    let Some((subject, pattern)) = strings(actual, expected) else {
        return false;
    };

    compiled(pattern).is_some_and(|regex| regex.is_match(subject))
}

/// Compiled form of `pattern`, compiling it on first use.
fn compiled(pattern: &str) -> Option<Regex> {
    if let Some(cached) = PATTERNS.read().get(pattern) {
        return cached.clone();
    }

    let regex = match RegexBuilder::new(pattern).size_limit(REGEX_SIZE_LIMIT).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            debug!(pattern, error = %e, "invalid regex in matches condition");
            None
        }
    };

    let mut patterns = PATTERNS.write();
    if patterns.len() >= PATTERN_CACHE_CAPACITY {
        patterns.clear();
    }
    patterns.insert(pattern.to_string(), regex.clone());
    regex
}
