//! Base/extension merge rules
//!
//! - No extension: the base, unchanged (same allocation).
//! - Either side is a service: the extension replaces the base.
//! - Either side is not a key/value structure: the extension replaces the base.
//! - Both are key/value structures: [`structural_merge`].
//!
//! Removal sentinels never survive into a merged value. A data extension that
//! is itself the sentinel removes nothing and resolves to the base.
//!
//! Merge never fails. A type mismatch at any level resolves to "extension wins".

use crate::value::Implementation;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Key of the removal sentinel object
pub const REMOVE_MARKER: &str = "$remove";

/// Sentinel that deletes a key from the merged result
///
/// An extension value of `null` overwrites with `null`, and an absent key keeps the
/// base value. Only this marker removes a base field.
#[must_use]
pub fn remove_marker() -> JsonValue {
    let mut marker = Map::with_capacity(1);
    marker.insert(REMOVE_MARKER.to_string(), JsonValue::Bool(true));
    JsonValue::Object(marker)
}

/// Whether a value is exactly the removal sentinel
#[must_use]
pub fn is_remove_marker(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => {
            map.len() == 1 && map.get(REMOVE_MARKER) == Some(&JsonValue::Bool(true))
        }
        _ => false,
    }
}

/// Compute the effective implementation from a base and an optional extension
#[must_use]
pub fn resolve(base: &Implementation, extension: Option<&Implementation>) -> Implementation {
    let Some(extension) = extension else {
        return base.clone();
    };

    match (base, extension) {
        (_, Implementation::Data(ext_value)) if is_remove_marker(ext_value) => base.clone(),
        (Implementation::Data(base_value), Implementation::Data(ext_value))
            if base_value.is_object() && ext_value.is_object() =>
        {
            Implementation::Data(Arc::new(structural_merge(base_value, ext_value)))
        }
        (_, Implementation::Data(ext_value)) if contains_marker(ext_value) => {
            Implementation::Data(Arc::new(strip_markers(ext_value)))
        }
        _ => extension.clone(),
    }
}

/// Recursively merge two JSON values, extension taking precedence
///
/// For every key in `extension`: nested objects on both sides merge
/// recursively; the removal sentinel deletes the key; anything else
/// (including arrays and `null`) overwrites. Keys only present in `base`
/// survive unchanged. Non-object inputs resolve to `extension`.
#[must_use]
pub fn structural_merge(base: &JsonValue, extension: &JsonValue) -> JsonValue {
    match (base, extension) {
        (JsonValue::Object(base_map), JsonValue::Object(ext_map)) => {
            let mut result = base_map.clone();
            for (key, ext_val) in ext_map {
                if is_remove_marker(ext_val) {
                    result.remove(key);
                    continue;
                }

                let merged = match result.get(key) {
                    Some(base_val @ JsonValue::Object(_)) if ext_val.is_object() => {
                        structural_merge(base_val, ext_val)
                    }
                    _ => strip_markers(ext_val),
                };
                result.insert(key.clone(), merged);
            }
            JsonValue::Object(result)
        }
        (_, ext_val) => strip_markers(ext_val),
    }
}

fn contains_marker(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => map.values().any(|v| is_remove_marker(v) || contains_marker(v)),
        _ => false,
    }
}

/// Drop removal sentinels from a value that has no base counterpart
pub(crate) fn strip_markers(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .filter(|(_, v)| !is_remove_marker(v))
                .map(|(k, v)| (k.clone(), strip_markers(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Formatter;

    #[test]
    fn nested_merge_keeps_untouched_keys() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let ext = json!({"a": {"y": 9}});
        assert_eq!(
            structural_merge(&base, &ext),
            json!({"a": {"x": 1, "y": 9}, "b": 3})
        );
    }

    #[test]
    fn extension_adds_new_keys() {
        let base = json!({"token": {"colorPrimary": "#1890ff"}});
        let ext = json!({"components": {"Card": {"headerFontSize": 16}}});
        assert_eq!(
            structural_merge(&base, &ext),
            json!({
                "token": {"colorPrimary": "#1890ff"},
                "components": {"Card": {"headerFontSize": 16}}
            })
        );
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let base = json!({"tags": [1, 2], "nested": {"list": ["a"]}});
        let ext = json!({"tags": [3], "nested": {"list": []}});
        assert_eq!(
            structural_merge(&base, &ext),
            json!({"tags": [3], "nested": {"list": []}})
        );
    }

    #[test]
    fn type_mismatch_extension_wins() {
        let base = json!({"a": {"x": 1}, "b": 2});
        let ext = json!({"a": 5, "b": {"y": 1}});
        assert_eq!(structural_merge(&base, &ext), json!({"a": 5, "b": {"y": 1}}));
    }

    #[test]
    fn null_and_falsy_overwrite() {
        let base = json!({"a": 1, "b": true, "c": "text"});
        let ext = json!({"a": null, "b": false, "c": ""});
        assert_eq!(
            structural_merge(&base, &ext),
            json!({"a": null, "b": false, "c": ""})
        );
    }

    #[test]
    fn remove_marker_deletes_key() {
        let base = json!({"a": 1, "b": {"x": 1, "y": 2}});
        let ext = json!({"a": remove_marker(), "b": {"y": remove_marker()}});
        assert_eq!(structural_merge(&base, &ext), json!({"b": {"x": 1}}));
    }

    #[test]
    fn remove_marker_for_absent_key_is_dropped() {
        let base = json!({"a": 1});
        let ext = json!({"b": remove_marker(), "c": {"d": remove_marker(), "e": 1}});
        assert_eq!(structural_merge(&base, &ext), json!({"a": 1, "c": {"e": 1}}));
    }

    #[test]
    fn marker_detection_is_exact() {
        assert!(is_remove_marker(&remove_marker()));
        assert!(!is_remove_marker(&json!({"$remove": false})));
        assert!(!is_remove_marker(&json!({"$remove": true, "other": 1})));
        assert!(!is_remove_marker(&json!("$remove")));
    }

    #[test]
    fn resolve_without_extension_is_base() {
        let base = Implementation::data(json!({"a": 1}));
        let resolved = resolve(&base, None);
        assert!(resolved.ptr_eq(&base));
    }

    #[test]
    fn resolve_primitive_replaces() {
        let base = Implementation::data(json!(1));
        let ext = Implementation::data(json!({"a": 1}));
        assert!(resolve(&base, Some(&ext)).ptr_eq(&ext));

        let base = Implementation::data(json!({"a": 1}));
        let ext = Implementation::data(json!("flat"));
        assert!(resolve(&base, Some(&ext)).ptr_eq(&ext));
    }

    #[test]
    fn resolve_sequence_replaces() {
        let base = Implementation::data(json!([1, 2]));
        let ext = Implementation::data(json!([3]));
        assert!(resolve(&base, Some(&ext)).ptr_eq(&ext));
    }

    #[test]
    fn resolve_service_replaces() {
        let base = Implementation::service(Formatter);
        let ext = Implementation::data(json!({"a": 1}));
        assert!(resolve(&base, Some(&ext)).ptr_eq(&ext));

        let base = Implementation::data(json!({"a": 1}));
        let ext = Implementation::service(Formatter);
        assert!(resolve(&base, Some(&ext)).ptr_eq(&ext));
    }

    #[test]
    fn resolve_replacement_drops_markers() {
        let base = Implementation::data(json!("flat"));
        let ext = Implementation::data(json!({"a": remove_marker(), "b": 1}));
        assert_eq!(resolve(&base, Some(&ext)).as_data(), Some(&json!({"b": 1})));

        let base = Implementation::service(Formatter);
        let ext = Implementation::data(json!({"k": {"a": remove_marker(), "b": 1}}));
        assert_eq!(resolve(&base, Some(&ext)).as_data(), Some(&json!({"k": {"b": 1}})));

        let nested = structural_merge(&json!({"k": 1}), &json!({"k": {"a": remove_marker(), "b": 1}}));
        assert_eq!(nested, json!({"k": {"b": 1}}));
    }

    #[test]
    fn resolve_top_level_marker_keeps_base() {
        let base = Implementation::data(json!([1, 2]));
        let ext = Implementation::data(remove_marker());
        assert!(resolve(&base, Some(&ext)).ptr_eq(&base));
    }

    #[test]
    fn resolve_composites_merge() {
        let base = Implementation::data(json!({"a": {"x": 1, "y": 2}, "b": 3}));
        let ext = Implementation::data(json!({"a": {"y": 9}}));
        let resolved = resolve(&base, Some(&ext));
        assert_eq!(resolved.as_data(), Some(&json!({"a": {"x": 1, "y": 9}, "b": 3})));
    }

    fn json_leaf() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(JsonValue::String),
        ]
    }

    fn json_tree() -> impl Strategy<Value = JsonValue> {
        json_leaf().prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(JsonValue::Array),
                prop::collection::btree_map("[a-d]", inner, 0..4)
                    .prop_map(|m| JsonValue::Object(m.into_iter().collect())),
            ]
        })
    }

    fn json_object() -> impl Strategy<Value = JsonValue> {
        prop::collection::btree_map("[a-d]", json_tree(), 0..5)
            .prop_map(|m| JsonValue::Object(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn empty_extension_is_identity(base in json_object()) {
            prop_assert_eq!(structural_merge(&base, &json!({})), base);
        }

        #[test]
        fn base_only_keys_survive(base in json_object(), ext in json_object()) {
            let merged = structural_merge(&base, &ext);
            let merged = merged.as_object().unwrap();
            let ext = ext.as_object().unwrap();
            for (key, value) in base.as_object().unwrap() {
                if !ext.contains_key(key) {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }

        #[test]
        fn extension_leaves_win(base in json_object(), ext in json_object()) {
            let merged = structural_merge(&base, &ext);
            let merged = merged.as_object().unwrap();
            for (key, value) in ext.as_object().unwrap() {
                if !value.is_object() {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }

        #[test]
        fn reapplying_extension_is_stable(base in json_object(), ext in json_object()) {
            let once = structural_merge(&base, &ext);
            let twice = structural_merge(&once, &ext);
            prop_assert_eq!(once, twice);
        }
    }
}
