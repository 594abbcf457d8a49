//! HTTP-facing contract of the schema endpoint, independent of any server
//! framework.
//!
//! `GET {endpoint}/{path}?refs=<int>&resolved=<int>` answers 200 with the
//! document, or 404 with the same generic body whatever the cause.

use std::sync::Arc;

use serde_json::{json, Value};
use url::form_urlencoded;

use crate::config::JsonSchemasConfig;
use crate::service::SchemaService;
use crate::types::Principal;

/// Raw query parameters.
///
/// Kept as strings so malformed integers fall back to the defaults instead
/// of rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaQuery {
    pub refs: Option<String>,
    pub resolved: Option<String>,
}

impl SchemaQuery {
    /// Parse a raw `application/x-www-form-urlencoded` query string.
    ///
    /// The first occurrence of a repeated parameter wins; unknown parameters
    /// are ignored. Never fails.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let Some(raw) = raw else {
            return query;
        };
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let slot = match key.as_ref() {
                "refs" => &mut query.refs,
                "resolved" => &mut query.resolved,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

/// Values used when a query parameter is absent or not an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagDefaults {
    pub replace_refs: bool,
    pub resolve_schema: bool,
}

impl From<&JsonSchemasConfig> for FlagDefaults {
    fn from(config: &JsonSchemasConfig) -> Self {
        Self {
            replace_refs: config.replace_refs,
            resolve_schema: config.resolve_schema,
        }
    }
}

/// Effective flags of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFlags {
    pub with_refs: bool,
    pub resolved: bool,
}

impl RequestFlags {
    /// Combine query parameters with defaults.
    ///
    /// `resolved` always forces `with_refs`, even when `refs=0` is explicit.
    pub fn from_query(query: &SchemaQuery, defaults: FlagDefaults) -> Self {
        let resolved = int_flag(query.resolved.as_deref(), defaults.resolve_schema);
        let with_refs = int_flag(query.refs.as_deref(), defaults.replace_refs) || resolved;
        Self {
            with_refs,
            resolved,
        }
    }
}

/// Truthiness of an integer literal; `default` when `raw` is not one.
///
/// Accepts a sign and `_` between digits. Magnitude is unbounded: only
/// whether any digit is non-zero matters.
fn int_flag(raw: Option<&str>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    let value = raw.trim();
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    let well_formed = !digits.is_empty()
        && !digits.starts_with('_')
        && !digits.ends_with('_')
        && !digits.contains("__")
        && digits.chars().all(|c| c.is_ascii_digit() || c == '_');
    if !well_formed {
        return default;
    }
    digits.chars().any(|c| matches!(c, '1'..='9'))
}

/// Status and JSON body to send back.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaResponse {
    pub status: u16,
    pub body: Arc<Value>,
}

impl SchemaResponse {
    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: Arc::new(json!({ "status": 404, "message": "Not Found" })),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Serve one schema request.
///
/// Blocks on the loader; run it off any async executor.
pub fn respond(
    service: &SchemaService,
    path: &str,
    flags: RequestFlags,
    principal: &Principal,
) -> SchemaResponse {
    match service.get_schema(path, flags.with_refs, flags.resolved, principal) {
        Ok(schema) => SchemaResponse {
            status: 200,
            body: schema,
        },
        Err(e) => {
            tracing::debug!(path, error = %e, "schema request failed");
            let mut response = SchemaResponse::not_found();
            response.status = e.status_code();
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::routing::{PathUrlMapper, RoutingRule, UrlScheme};

    fn query(refs: Option<&str>, resolved: Option<&str>) -> SchemaQuery {
        SchemaQuery {
            refs: refs.map(String::from),
            resolved: resolved.map(String::from),
        }
    }

    const OFF: FlagDefaults = FlagDefaults {
        replace_refs: false,
        resolve_schema: false,
    };

    #[test]
    fn absent_parameters_use_defaults() {
        let flags = RequestFlags::from_query(&query(None, None), OFF);
        assert!(!flags.with_refs && !flags.resolved);

        let on = FlagDefaults {
            replace_refs: true,
            resolve_schema: false,
        };
        let flags = RequestFlags::from_query(&query(None, None), on);
        assert!(flags.with_refs && !flags.resolved);
    }

    #[test]
    fn integers_are_booleans() {
        let flags = RequestFlags::from_query(&query(Some("1"), Some("0")), OFF);
        assert!(flags.with_refs && !flags.resolved);
        let flags = RequestFlags::from_query(&query(Some("2"), None), OFF);
        assert!(flags.with_refs);
        let flags = RequestFlags::from_query(&query(Some("-1"), None), OFF);
        assert!(flags.with_refs);
    }

    #[test]
    fn non_integers_fall_back_to_defaults() {
        let flags = RequestFlags::from_query(&query(Some("true"), Some("yes")), OFF);
        assert!(!flags.with_refs && !flags.resolved);

        let on = FlagDefaults {
            replace_refs: true,
            resolve_schema: true,
        };
        let flags = RequestFlags::from_query(&query(Some(""), Some("x")), on);
        assert!(flags.with_refs && flags.resolved);
    }

    #[test]
    fn integer_magnitude_does_not_matter() {
        let flags = RequestFlags::from_query(
            &query(Some("99999999999999999999"), Some("-00000000000000000000")),
            OFF,
        );
        assert!(flags.with_refs && !flags.resolved);
        let flags = RequestFlags::from_query(&query(Some(" +1_000 "), None), OFF);
        assert!(flags.with_refs);
        let flags = RequestFlags::from_query(&query(Some("1__0"), Some("-")), OFF);
        assert!(!flags.with_refs && !flags.resolved);
    }

    #[test]
    fn parse_query_first_value_wins() {
        assert_eq!(
            SchemaQuery::parse(Some("refs=1&refs=0&resolved=0&other=x")),
            query(Some("1"), Some("0"))
        );
        assert_eq!(
            SchemaQuery::parse(Some("resolved=%31&refs")),
            query(Some(""), Some("1"))
        );
        assert_eq!(SchemaQuery::parse(None), SchemaQuery::default());
        assert_eq!(SchemaQuery::parse(Some("%zz=&&=")), SchemaQuery::default());
    }

    #[test]
    fn resolved_forces_refs() {
        let flags = RequestFlags::from_query(&query(Some("0"), Some("1")), OFF);
        assert_eq!(
            flags,
            RequestFlags {
                with_refs: true,
                resolved: true
            }
        );
    }

    #[test]
    fn missing_and_broken_schemas_look_the_same() {
        let loader = MemoryLoader::new().with_schema(
            "https://example.org/schemas/broken.json",
            json!({ "a": { "$ref": "#/definitions/missing" } }),
        );
        let rule = RoutingRule::new("/schemas", "example.org").unwrap();
        let mapper = PathUrlMapper::new(rule, UrlScheme::Https).unwrap();
        let service = SchemaService::builder(mapper, Arc::new(loader)).build();
        let flags = RequestFlags {
            with_refs: true,
            resolved: false,
        };

        let missing = respond(&service, "missing.json", flags, &Principal::Anonymous);
        let broken = respond(&service, "broken.json", flags, &Principal::Anonymous);
        assert_eq!(missing, SchemaResponse::not_found());
        assert_eq!(broken, missing);

        let raw = respond(
            &service,
            "broken.json",
            RequestFlags {
                with_refs: false,
                resolved: false,
            },
            &Principal::Anonymous,
        );
        assert!(raw.is_success());
    }
}
