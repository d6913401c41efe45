//! Per-activation environment
//!
//! Every top-level field of a `/run` request other than `value` is exposed to
//! the action as an environment entry named `__OW_` + the upper-cased field
//! name. The table is built once per activation and passed to the action by
//! explicit parameter. The proxy never mutates the process-wide environment:
//! entries are call-scoped, concurrent activations cannot observe each
//! other's context, and nothing accumulates across calls.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Prefix applied to every context-derived environment entry
pub const ENV_PREFIX: &str = "__OW_";

/// The environment table one activation sees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationEnv {
    entries: BTreeMap<String, String>,
}

impl ActivationEnv {
    /// Build the table from the non-`value` top-level fields of a `/run`
    /// request.
    ///
    /// A field named `value` (compared case-insensitively) is never exposed.
    /// String values are taken verbatim; numbers and booleans use their JSON
    /// text form; null, object, and array values are skipped.
    pub fn from_context(context: &Map<String, Value>) -> Self {
        let mut entries = BTreeMap::new();
        for (key, value) in context {
            if key.eq_ignore_ascii_case("value") {
                continue;
            }
            if let Some(text) = stringify(value) {
                entries.insert(format!("{ENV_PREFIX}{}", key.to_uppercase()), text);
            }
        }
        Self { entries }
    }

    /// Look up one entry by its full `__OW_*` name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterate over all entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// String form of a context field, or `None` for shapes that are not exposed.
fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Object(_) | Value::Array(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn context(fields: Value) -> Map<String, Value> {
        fields.as_object().unwrap().clone()
    }

    #[test]
    fn fields_are_prefixed_and_upper_cased() {
        let env = ActivationEnv::from_context(&context(json!({
            "activationId": "abc123",
            "namespace": "guest",
        })));
        assert_eq!(env.get("__OW_ACTIVATIONID"), Some("abc123"));
        assert_eq!(env.get("__OW_NAMESPACE"), Some("guest"));
    }

    #[test]
    fn value_field_is_never_exposed() {
        let env = ActivationEnv::from_context(&context(json!({
            "value": {"x": 1},
            "VALUE": "shadow",
            "deadline": "99",
        })));
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("__OW_DEADLINE"), Some("99"));
    }

    #[test]
    fn primitives_use_json_text_and_composites_are_skipped() {
        let env = ActivationEnv::from_context(&context(json!({
            "deadline": 1700000000,
            "cold": true,
            "missing": null,
            "nested": {"a": 1},
            "list": [1, 2],
        })));
        assert_eq!(env.get("__OW_DEADLINE"), Some("1700000000"));
        assert_eq!(env.get("__OW_COLD"), Some("true"));
        assert_eq!(env.len(), 2);
    }

    proptest! {
        #[test]
        fn every_exposed_entry_carries_the_prefix(
            keys in proptest::collection::vec("[a-zA-Z][a-zA-Z0-9_]{0,12}", 0..8)
        ) {
            let mut fields = Map::new();
            for key in &keys {
                fields.insert(key.clone(), Value::String("v".into()));
            }
            let env = ActivationEnv::from_context(&fields);
            for (name, _) in env.iter() {
                prop_assert!(name.starts_with(ENV_PREFIX));
                let upper = name.to_uppercase();
                prop_assert_eq!(upper.as_str(), name);
            }
        }
    }
}
