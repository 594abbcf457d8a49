//! Core types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON key marking a reference object.
pub const REF_KEY: &str = "$ref";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Identity of the caller a schema is resolved for.
///
/// Only used to partition the resolution cache: loaders that filter
/// documents by caller may produce different results per principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Principal {
    #[default]
    Anonymous,
    User(String),
}

impl Principal {
    /// Build a principal from an optional identity header value.
    ///
    /// Missing or blank values are anonymous.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(id) if !id.is_empty() => Principal::User(id.to_string()),
            _ => Principal::Anonymous,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Principal::User(id.into())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Anonymous => f.write_str("anonymous"),
            Principal::User(id) => write!(f, "user:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_from_header() {
        assert_eq!(Principal::from_header(None), Principal::Anonymous);
        assert_eq!(Principal::from_header(Some("  ")), Principal::Anonymous);
        assert_eq!(
            Principal::from_header(Some(" alice ")),
            Principal::user("alice")
        );
    }

    #[test]
    fn principal_display() {
        assert_eq!(Principal::Anonymous.to_string(), "anonymous");
        assert_eq!(Principal::user("42").to_string(), "user:42");
    }

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&Value::Null), "null");
        assert_eq!(json_type_name(&serde_json::json!([1])), "array");
        assert_eq!(json_type_name(&serde_json::json!({})), "object");
    }
}
