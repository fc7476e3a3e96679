//! Read-only request context with dot-path lookup.
//!
//! A `Context` is built once per decision request and discarded afterwards.
//! Lookups never fail loudly: a missing segment, or a segment that lands on a
//! non-object value, simply yields `None`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Immutable view over request data.
///
/// Serializes as the plain object. Deserializing goes through
/// [`Context::new`], so `":key"` symbol keys are normalized either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context {
    data: Map<String, Value>,
}

impl Context {
    /// Create a context from a JSON object.
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data: normalize_keys(data),
        }
    }

    /// Create a context from any JSON value.
    ///
    /// Non-object values produce an empty context, since there is nothing to
    /// look up by name.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::default(),
        }
    }

    /// Create a context from key/value pairs.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Resolve a dot-separated path (`"applicant.address.city"`).
    ///
    /// Returns `None` as soon as a segment is absent or the current value is
    /// not an object. A stored `null` is returned as `Some(Value::Null)`;
    /// operators treat both the same way.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.data.get(first)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Whether the path resolves to a non-null value.
    pub fn has(&self, path: &str) -> bool {
        matches!(self.get(path), Some(v) if !v.is_null())
    }

    /// Return a new context with `overlay` merged on top of this one.
    ///
    /// Overlay keys may be dot paths; intermediate objects are created as
    /// needed. The receiver is left untouched.
    pub fn merged<I, K>(&self, overlay: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut data = self.data.clone();
        for (path, value) in overlay {
            insert_path(&mut data, path.as_ref(), value);
        }
        Self { data }
    }

    /// Borrow the underlying object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Convert back into a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self::new(map)
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Strip the leading `:` of symbol-style keys (`":age"` becomes `"age"`) at
/// every nesting level, so producers that serialize symbols and strings
/// differently still resolve to the same path.
fn normalize_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (normalize_key(key), normalize_value(value)))
        .collect()
}

fn normalize_key(key: String) -> String {
    match key.strip_prefix(':') {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => key,
    }
}

fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_keys(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        other => other,
    }
}

fn insert_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::<String, Value>::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        Context::from_value(value)
    }

    #[test]
    fn test_top_level_lookup() {
        let context = ctx(json!({"age": 20}));
        assert_eq!(context.get("age"), Some(&json!(20)));
        assert_eq!(context.get("missing"), None);
    }

    #[test]
    fn test_nested_lookup() {
        let context = ctx(json!({"user": {"address": {"city": "Lisbon"}}}));
        assert_eq!(context.get("user.address.city"), Some(&json!("Lisbon")));
        assert_eq!(context.get("user.address.zip"), None);
    }

    #[test]
    fn test_lookup_through_scalar_is_absent() {
        let context = ctx(json!({"user": "plain string"}));
        assert_eq!(context.get("user.name"), None);
    }

    #[test]
    fn test_stored_null_is_returned() {
        let context = ctx(json!({"nickname": null}));
        assert_eq!(context.get("nickname"), Some(&Value::Null));
        assert!(!context.has("nickname"));
    }

    #[test]
    fn test_symbol_keys_normalized() {
        let context = ctx(json!({":status": "active", "meta": {":tier": "gold"}}));
        assert_eq!(context.get("status"), Some(&json!("active")));
        assert_eq!(context.get("meta.tier"), Some(&json!("gold")));
    }

    #[test]
    fn test_deserialize_normalizes_symbol_keys() {
        let context: Context =
            serde_json::from_value(json!({":status": "active", "meta": {":tier": "gold"}})).unwrap();
        assert_eq!(context.get("status"), Some(&json!("active")));
        assert_eq!(context.get("meta.tier"), Some(&json!("gold")));

        let context: Context = serde_yaml::from_str("\":status\": active\n").unwrap();
        assert_eq!(context.get("status"), Some(&json!("active")));
        assert_eq!(serde_json::to_value(&context).unwrap(), json!({"status": "active"}));

        assert!(serde_json::from_value::<Context>(json!([1, 2])).is_err());
    }

    #[test]
    fn test_merged_leaves_original_untouched() {
        let base = ctx(json!({"a": 1, "nested": {"x": 1}}));
        let derived = base.merged([("b", json!(2)), ("nested.y", json!(3))]);

        assert_eq!(base.get("b"), None);
        assert_eq!(derived.get("a"), Some(&json!(1)));
        assert_eq!(derived.get("b"), Some(&json!(2)));
        assert_eq!(derived.get("nested.x"), Some(&json!(1)));
        assert_eq!(derived.get("nested.y"), Some(&json!(3)));
    }

    #[test]
    fn test_non_object_value_is_empty_context() {
        assert!(ctx(json!([1, 2, 3])).is_empty());
    }
}
