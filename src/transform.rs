//! Resolve-mode transforms applied after reference inlining.

use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::types::json_type_name;

/// Final transform applied to a schema when `resolved` is requested.
pub trait SchemaTransform: Send + Sync {
    /// # Errors
    ///
    /// Returns `ResolveError::Transform` if the schema cannot be transformed.
    fn transform(&self, schema: Value) -> Result<Value, ResolveError>;
}

/// Returns the schema unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl SchemaTransform for IdentityTransform {
    fn transform(&self, schema: Value) -> Result<Value, ResolveError> {
        Ok(schema)
    }
}

/// Flattens `allOf` compositions into their parent schema.
///
/// Each branch is deep-merged into the parent in order: objects merge
/// recursively, arrays are unioned keeping first occurrence order, other
/// values from later branches win. Branch `title`s are dropped so the
/// parent keeps its own. Useful for clients whose JSON Schema support
/// stops short of `allOf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllOfMerger;

impl SchemaTransform for AllOfMerger {
    fn transform(&self, schema: Value) -> Result<Value, ResolveError> {
        merge_all_of(schema, "")
    }
}

fn merge_all_of(value: Value, path: &str) -> Result<Value, ResolveError> {
    match value {
        Value::Object(mut map) => {
            if let Some(all_of) = map.remove("allOf") {
                let Value::Array(branches) = all_of else {
                    return Err(ResolveError::Transform {
                        message: format!(
                            "allOf at {}/allOf must be an array, got {}",
                            path,
                            json_type_name(&all_of)
                        ),
                    });
                };
                for (i, branch) in branches.into_iter().enumerate() {
                    let branch = merge_all_of(branch, &format!("{}/allOf/{}", path, i))?;
                    let Value::Object(mut branch) = branch else {
                        return Err(ResolveError::Transform {
                            message: format!(
                                "allOf branch at {}/allOf/{} must be an object, got {}",
                                path,
                                i,
                                json_type_name(&branch)
                            ),
                        });
                    };
                    branch.remove("title");
                    merge_into(&mut map, branch);
                }
            }

            let mut result = Map::new();
            for (key, child) in map {
                let child_path = format!("{}/{}", path, key);
                result.insert(key, merge_all_of(child, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        Value::Array(arr) => arr
            .into_iter()
            .enumerate()
            .map(|(i, item)| merge_all_of(item, &format!("{}/{}", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, incoming) in source {
        let Some(existing) = target.get_mut(&key) else {
            target.insert(key, incoming);
            continue;
        };
        match (existing, incoming) {
            (Value::Object(existing), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (Value::Array(existing), Value::Array(incoming)) => {
                for item in incoming {
                    if !existing.contains(&item) {
                        existing.push(item);
                    }
                }
            }
            (existing, incoming) => *existing = incoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_is_noop() {
        let schema = json!({ "allOf": [{ "type": "string" }] });
        assert_eq!(IdentityTransform.transform(schema.clone()).unwrap(), schema);
    }

    #[test]
    fn merges_all_of_into_parent() {
        let schema = json!({
            "title": "Record",
            "type": "object",
            "required": ["id"],
            "allOf": [
                {
                    "title": "Base",
                    "properties": { "id": { "type": "string" } },
                    "required": ["id", "created"]
                },
                {
                    "properties": { "title": { "type": "string" } },
                    "required": ["title"]
                }
            ]
        });

        let result = AllOfMerger.transform(schema).unwrap();
        assert_eq!(
            result,
            json!({
                "title": "Record",
                "type": "object",
                "required": ["id", "created", "title"],
                "properties": {
                    "id": { "type": "string" },
                    "title": { "type": "string" }
                }
            })
        );
    }

    #[test]
    fn later_branches_win_for_scalars() {
        let schema = json!({
            "allOf": [{ "maxLength": 10 }, { "maxLength": 5 }]
        });
        let result = AllOfMerger.transform(schema).unwrap();
        assert_eq!(result, json!({ "maxLength": 5 }));
    }

    #[test]
    fn nested_all_of_is_merged() {
        let schema = json!({
            "properties": {
                "creator": {
                    "allOf": [
                        { "properties": { "name": { "type": "string" } } },
                        { "allOf": [{ "properties": { "orcid": { "type": "string" } } }] }
                    ]
                }
            }
        });
        let result = AllOfMerger.transform(schema).unwrap();
        assert_eq!(
            result["properties"]["creator"],
            json!({
                "properties": {
                    "name": { "type": "string" },
                    "orcid": { "type": "string" }
                }
            })
        );
    }

    #[test]
    fn non_array_all_of_fails() {
        let err = AllOfMerger
            .transform(json!({ "allOf": { "type": "string" } }))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Transform { .. }));
        assert!(err.to_string().contains("must be an array, got object"));
    }

    #[test]
    fn non_object_branch_fails() {
        let err = AllOfMerger
            .transform(json!({ "properties": { "x": { "allOf": [true] } } }))
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("allOf branch at /properties/x/allOf/0 must be an object, got boolean"));
    }
}
