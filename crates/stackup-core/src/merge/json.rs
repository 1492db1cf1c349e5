//! JSON merge strategies (`package.json`, `tsconfig.json`, ...)

use super::{Contribution, MergeError};
use serde_json::{Map, Value};

/// Recursive merge: objects merge key by key, later scalars win, arrays are
/// concatenated and de-duplicated by deep equality.
pub fn merge_deep(contributions: &[Contribution]) -> Result<String, MergeError> {
    let mut merged = Value::Object(Map::new());
    for contribution in contributions {
        deep_merge(&mut merged, parse(contribution)?);
    }
    render(&merged)
}

/// Top-level merge: later values replace earlier ones whole, except two
/// arrays, which are concatenated and de-duplicated. A document that is not
/// an object replaces the result, as in [`merge_deep`].
pub fn merge_shallow(contributions: &[Contribution]) -> Result<String, MergeError> {
    let mut merged = Value::Object(Map::new());
    for contribution in contributions {
        match (&mut merged, parse(contribution)?) {
            (Value::Object(base), Value::Object(overlay)) => {
                for (key, value) in overlay {
                    match (base.get_mut(&key), value) {
                        (Some(Value::Array(existing)), Value::Array(items)) => union(existing, items),
                        (_, value) => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (Value::Array(base), Value::Array(items)) => union(base, items),
            (base, overlay) => *base = overlay,
        }
    }
    render(&merged)
}

/// Merge `overlay` into `base` in place
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base_items), Value::Array(overlay_items)) => union(base_items, overlay_items),
        (base, overlay) => *base = overlay,
    }
}

fn union(base: &mut Vec<Value>, items: Vec<Value>) {
    for item in items {
        if !base.contains(&item) {
            base.push(item);
        }
    }
}

fn parse(contribution: &Contribution) -> Result<Value, MergeError> {
    if contribution.content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(&contribution.content).map_err(|source| MergeError::InvalidJson {
        module: contribution.module.clone(),
        source,
    })
}

fn render(value: &Value) -> Result<String, MergeError> {
    let mut out = serde_json::to_string_pretty(value).map_err(MergeError::Render)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contributions(docs: &[(&str, &str)]) -> Vec<Contribution> {
        docs.iter()
            .map(|(module, content)| Contribution::new(*module, *content))
            .collect()
    }

    fn parsed(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_dependencies_from_both_modules_are_kept() {
        let merged = merge_deep(&contributions(&[
            ("x", r#"{"dependencies":{"vue":"^3"}}"#),
            ("y", r#"{"dependencies":{"vuetify":"^3"}}"#),
        ]))
        .unwrap();
        assert_eq!(
            parsed(&merged),
            json!({"dependencies": {"vue": "^3", "vuetify": "^3"}})
        );
    }

    #[test]
    fn test_later_scalar_wins_and_key_order_is_kept() {
        let merged = merge_deep(&contributions(&[
            ("a", r#"{"name":"app","version":"0.0.0","scripts":{"dev":"vite"}}"#),
            ("b", r#"{"version":"1.0.0","private":true}"#),
        ]))
        .unwrap();
        assert_eq!(
            merged,
            "{\n  \"name\": \"app\",\n  \"version\": \"1.0.0\",\n  \"scripts\": {\n    \"dev\": \"vite\"\n  },\n  \"private\": true\n}\n"
        );
    }

    #[test]
    fn test_arrays_are_unioned_by_deep_equality() {
        let merged = merge_deep(&contributions(&[
            ("a", r#"{"include":["src/**/*.ts",{"x":1}]}"#),
            ("b", r#"{"include":["src/**/*.vue",{"x":1},"src/**/*.ts"]}"#),
        ]))
        .unwrap();
        assert_eq!(
            parsed(&merged)["include"],
            json!(["src/**/*.ts", {"x": 1}, "src/**/*.vue"])
        );
    }

    #[test]
    fn test_empty_contribution_is_an_empty_object() {
        let merged = merge_deep(&contributions(&[("a", "  \n"), ("b", r#"{"a":1}"#)])).unwrap();
        assert_eq!(parsed(&merged), json!({"a": 1}));
    }

    #[test]
    fn test_invalid_json_names_the_module() {
        let err = merge_deep(&contributions(&[("a", "{}"), ("broken", "{nope")])).unwrap_err();
        assert!(matches!(err, MergeError::InvalidJson { module, .. } if module == "broken"));
    }

    #[test]
    fn test_shallow_merge_replaces_nested_objects() {
        let merged = merge_shallow(&contributions(&[
            ("a", r#"{"compilerOptions":{"strict":true},"include":["src"]}"#),
            ("b", r#"{"compilerOptions":{"jsx":"preserve"},"include":["env.d.ts"]}"#),
        ]))
        .unwrap();
        assert_eq!(
            parsed(&merged),
            json!({"compilerOptions": {"jsx": "preserve"}, "include": ["src", "env.d.ts"]})
        );
    }

    #[test]
    fn test_non_object_document_replaces_result() {
        let input = contributions(&[("a", r#"{"a":1}"#), ("b", "[1,2]")]);
        assert_eq!(merge_shallow(&input).unwrap(), "[\n  1,\n  2\n]\n");
        assert_eq!(merge_shallow(&input).unwrap(), merge_deep(&input).unwrap());

        let single = contributions(&[("a", "[1,2]")]);
        assert_eq!(parsed(&merge_shallow(&single).unwrap()), json!([1, 2]));

        let back_to_object = contributions(&[("a", "[1]"), ("b", r#"{"b":true}"#)]);
        assert_eq!(parsed(&merge_shallow(&back_to_object).unwrap()), json!({"b": true}));
    }

    #[test]
    fn test_merge_is_deterministic() {
        let input = contributions(&[
            ("a", r#"{"b":1,"a":{"z":1,"y":2}}"#),
            ("b", r#"{"a":{"x":3},"c":[1,2]}"#),
        ]);
        assert_eq!(merge_deep(&input).unwrap(), merge_deep(&input).unwrap());
    }
}
