//! JSON Schema server core
//!
//! Resolves, caches and serves JSON Schema documents addressed by relative
//! paths, translating between those paths and the absolute URLs under which
//! the schemas are published.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use jsonschemas::{MemoryLoader, PathUrlMapper, Principal, RoutingRule, SchemaService, UrlScheme};
//! use serde_json::json;
//!
//! let rule = RoutingRule::new("/schemas", "example.org").unwrap();
//! let mapper = PathUrlMapper::new(rule, UrlScheme::Https).unwrap();
//!
//! let url = mapper.path_to_url("records/record-v1.0.0.json").unwrap();
//! assert_eq!(url, "https://example.org/schemas/records/record-v1.0.0.json");
//!
//! let loader = MemoryLoader::new().with_schema(
//!     url.as_str(),
//!     json!({
//!         "type": "object",
//!         "properties": { "title": { "$ref": "#/definitions/title" } },
//!         "definitions": { "title": { "type": "string" } }
//!     }),
//! );
//! let service = SchemaService::builder(mapper, Arc::new(loader)).build();
//!
//! let schema = service
//!     .get_schema("records/record-v1.0.0.json", true, false, &Principal::Anonymous)
//!     .unwrap();
//! assert_eq!(schema["properties"]["title"], json!({ "type": "string" }));
//! ```
//!
//! # Request flags
//!
//! | Flag | Effect |
//! |------|--------|
//! | `with_refs` | Inline every `$ref`, fetching other documents through the loader |
//! | `resolved` | Run the configured [`SchemaTransform`] (default: merge `allOf`) |
//!
//! Over HTTP the flags are the `refs` and `resolved` integer query
//! parameters; `resolved=1` implies `refs=1`.

mod boundary;
mod cache;
mod config;
mod error;
mod linter;
mod loader;
mod refs;
mod routing;
mod service;
mod transform;
mod types;

#[cfg(feature = "server")]
pub mod server;

pub use boundary::{respond, FlagDefaults, RequestFlags, SchemaQuery, SchemaResponse};
pub use cache::{CacheKey, CacheStats, ResolutionCache, DEFAULT_CACHE_CAPACITY};
pub use config::{JsonSchemasConfig, LoaderKind, ResolverKind};
pub use error::{ConfigError, LoadError, ResolveError, RoutingError, SchemaError};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{load_schema, navigate_fragment, FileSystemLoader, MemoryLoader, SchemaLoader};
pub use refs::{has_refs, inline_refs};
pub use routing::{validate_path, PathUrlMapper, RoutingRule, UrlScheme};
pub use service::{SchemaService, SchemaServiceBuilder};
pub use transform::{AllOfMerger, IdentityTransform, SchemaTransform};
pub use types::Principal;

#[cfg(feature = "remote")]
pub use loader::HttpLoader;
