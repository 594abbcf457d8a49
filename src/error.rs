//! Error types for schema routing, loading and reference resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while embedding a schema path into the routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("schema path is empty")]
    EmptyPath,

    #[error("schema path must be relative: {path}")]
    AbsolutePath { path: String },

    #[error("invalid segment \"{segment}\" in schema path {path}")]
    InvalidSegment { path: String, segment: String },

    #[error("character {ch:?} is not allowed in schema path {path}")]
    ForbiddenCharacter { path: String, ch: char },

    #[error("invalid routing rule: {message}")]
    InvalidRule { message: String },
}

/// Errors raised by a [`SchemaLoader`](crate::SchemaLoader).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no schema found at {url}")]
    NotFound { url: String },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl LoadError {
    /// True when the loader reported that nothing exists at the URL.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}

/// Errors while inlining references or running the resolve transform.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot load referenced document for {reference}: {source}")]
    Load {
        reference: String,
        #[source]
        source: LoadError,
    },

    #[error("invalid reference \"{reference}\": {message}")]
    InvalidReference { reference: String, message: String },

    #[error("fragment not found: {reference}")]
    FragmentNotFound { reference: String },

    #[error("schema transform failed: {message}")]
    Transform { message: String },
}

/// Errors surfaced by [`SchemaService::get_schema`](crate::SchemaService::get_schema).
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema not found: {url}")]
    NotFound {
        url: String,
        #[source]
        source: LoadError,
    },

    #[error(transparent)]
    Reference(#[from] ResolveError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

impl SchemaError {
    /// HTTP status presented to clients.
    ///
    /// Missing schemas and unresolvable references are indistinguishable
    /// from the outside.
    pub fn status_code(&self) -> u16 {
        404
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchemaError::NotFound { .. } => 3,
            SchemaError::Reference(ResolveError::Load { .. }) => 3,
            _ => 2,
        }
    }
}

/// Errors while reading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    InvalidToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}
