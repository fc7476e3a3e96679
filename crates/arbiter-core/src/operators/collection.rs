//! Set-style operators over JSON arrays. Both sides must be arrays.

use serde_json::Value;

use super::{OperatorEnv, OperatorFn};

pub(super) const OPERATORS: &[(&str, OperatorFn)] = &[
    ("contains_all", contains_all),
    ("contains_any", contains_any),
    ("intersects", intersects),
    ("subset_of", subset_of),
];

fn arrays<'a>(actual: Option<&'a Value>, expected: &'a Value) -> Option<(&'a [Value], &'a [Value])> {
    Some((actual?.as_array()?.as_slice(), expected.as_array()?.as_slice()))
}

/// Every expected element appears in `actual`.
fn contains_all(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    arrays(actual, expected).is_some_and(|(a, e)| e.iter().all(|item| a.contains(item)))
}

/// At least one expected element appears in `actual`.
fn contains_any(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    arrays(actual, expected).is_some_and(|(a, e)| e.iter().any(|item| a.contains(item)))
}

/// The two arrays share at least one element.
fn intersects(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    arrays(actual, expected).is_some_and(|(a, e)| a.iter().any(|item| e.contains(item)))
}

/// Every element of `actual` appears in the expected array.
fn subset_of(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    arrays(actual, expected).is_some_and(|(a, e)| a.iter().all(|item| e.contains(item)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env() -> OperatorEnv {
        OperatorEnv::default()
    }

    #[test]
    fn test_contains_all() {
        let tags = json!(["vip", "verified", "eu"]);
        assert!(contains_all(Some(&tags), &json!(["vip", "eu"]), &env()));
        assert!(!contains_all(Some(&tags), &json!(["vip", "us"]), &env()));
        assert!(contains_all(Some(&tags), &json!([]), &env()));
    }

    #[test]
    fn test_contains_any_and_intersects() {
        let tags = json!(["vip", "verified"]);
        for op in [contains_any, intersects] {
            assert!(op(Some(&tags), &json!(["new", "vip"]), &env()));
            assert!(!op(Some(&tags), &json!(["new"]), &env()));
            assert!(!op(Some(&tags), &json!([]), &env()));
        }
    }

    #[test]
    fn test_subset_of() {
        let allowed = json!(["read", "write", "admin"]);
        assert!(subset_of(Some(&json!(["read", "write"])), &allowed, &env()));
        assert!(!subset_of(Some(&json!(["read", "delete"])), &allowed, &env()));
        assert!(subset_of(Some(&json!([])), &allowed, &env()));
    }

    #[test]
    fn test_non_arrays_are_false() {
        assert!(!contains_all(Some(&json!("vip")), &json!(["vip"]), &env()));
        assert!(!contains_any(Some(&json!(["vip"])), &json!("vip"), &env()));
        assert!(!intersects(None, &json!(["vip"]), &env()));
        assert!(!subset_of(Some(&Value::Null), &json!(["vip"]), &env()));
    }
}
