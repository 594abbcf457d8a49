//! Service configuration.
//!
//! Values come from an optional TOML file; every key has a default so an
//! empty file (or none at all) yields a working local setup.
//!
//! ```toml
//! endpoint = "/schemas"
//! host = "schemas.example.org"
//! url_scheme = "https"
//! loader = "filesystem"
//! resolver = "all_of"
//! replace_refs = false
//! resolve_schema = false
//! register_routes = true
//! cache_capacity = 1000
//! schema_dir = "schemas"
//! principal_header = "x-remote-user"
//! bind = "127.0.0.1:5000"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::ConfigError;
use crate::routing::{PathUrlMapper, RoutingRule, UrlScheme};

/// Host value that only makes sense during development.
const PLACEHOLDER_HOST: &str = "localhost";

/// Which [`SchemaLoader`](crate::SchemaLoader) the binary wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderKind {
    /// Read schemas from `schema_dir`.
    #[default]
    Filesystem,
    /// Fetch schemas from their URLs (requires the `remote` feature).
    Http,
}

/// Which [`SchemaTransform`](crate::SchemaTransform) runs in resolve mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    #[default]
    AllOf,
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JsonSchemasConfig {
    /// URL path prefix under which schemas are served.
    pub endpoint: String,
    /// The single authoritative host for building and matching schema URLs.
    pub host: String,
    pub url_scheme: UrlScheme,
    pub loader: LoaderKind,
    pub resolver: ResolverKind,
    /// Inline references when the request does not say.
    pub replace_refs: bool,
    /// Run the resolve transform when the request does not say.
    pub resolve_schema: bool,
    /// Expose the HTTP endpoint at all.
    pub register_routes: bool,
    pub cache_capacity: usize,
    pub schema_dir: PathBuf,
    /// Request header carrying the caller identity.
    pub principal_header: Option<String>,
    pub bind: String,
}

impl Default for JsonSchemasConfig {
    fn default() -> Self {
        Self {
            endpoint: "/schemas".to_string(),
            host: PLACEHOLDER_HOST.to_string(),
            url_scheme: UrlScheme::Https,
            loader: LoaderKind::Filesystem,
            resolver: ResolverKind::AllOf,
            replace_refs: false,
            resolve_schema: false,
            register_routes: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            schema_dir: PathBuf::from("schemas"),
            principal_header: None,
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl JsonSchemasConfig {
    /// Read a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file can't be read, or
    /// `ConfigError::InvalidToml` if it doesn't parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::InvalidToml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the configuration, warning about insecure defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the cache capacity is zero or the
    /// endpoint/host do not form a valid routing rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host_is_placeholder() {
            tracing::warn!(host = %self.host, "schema host is set to a placeholder; set `host` for production");
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "cache_capacity must be at least 1".to_string(),
            });
        }
        self.mapper().map(|_| ())
    }

    /// True when `host` is empty or the development placeholder.
    pub fn host_is_placeholder(&self) -> bool {
        let host = self.host.trim();
        host.is_empty() || host == PLACEHOLDER_HOST
    }

    /// Build the path/URL mapper for this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` wrapping the routing error.
    pub fn mapper(&self) -> Result<PathUrlMapper, ConfigError> {
        RoutingRule::new(&self.endpoint, &self.host)
            .and_then(|rule| PathUrlMapper::new(rule, self.url_scheme))
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })
    }
}
