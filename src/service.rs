//! Schema retrieval: routing, loading, inlining, transforming and caching.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{CacheKey, CacheStats, ResolutionCache, DEFAULT_CACHE_CAPACITY};
use crate::error::{RoutingError, SchemaError};
use crate::loader::SchemaLoader;
use crate::refs::inline_refs;
use crate::routing::PathUrlMapper;
use crate::transform::{AllOfMerger, SchemaTransform};
use crate::types::Principal;

/// Serves resolved schemas by path.
///
/// Cheap to share behind an `Arc`; all methods take `&self` and may run
/// concurrently.
pub struct SchemaService {
    mapper: PathUrlMapper,
    loader: Arc<dyn SchemaLoader>,
    transform: Arc<dyn SchemaTransform>,
    cache: ResolutionCache,
}

impl std::fmt::Debug for SchemaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaService")
            .field("mapper", &self.mapper)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

impl SchemaService {
    /// Start building a service around a mapper and loader.
    ///
    /// The resolve transform defaults to [`AllOfMerger`] and the cache to
    /// [`DEFAULT_CACHE_CAPACITY`] entries.
    pub fn builder(mapper: PathUrlMapper, loader: Arc<dyn SchemaLoader>) -> SchemaServiceBuilder {
        SchemaServiceBuilder {
            mapper,
            loader,
            transform: Arc::new(AllOfMerger),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Retrieve the schema at `path`.
    ///
    /// With `with_refs`, references are inlined relative to the schema's own
    /// URL. With `resolved`, the configured transform runs afterwards (or on
    /// the raw document when `with_refs` is false). Results are memoized per
    /// `(path, with_refs, resolved, principal)`.
    ///
    /// # Errors
    ///
    /// - `SchemaError::Routing` if the path cannot be turned into a URL.
    /// - `SchemaError::NotFound` if the loader fails for the schema itself.
    /// - `SchemaError::Reference` if inlining or the transform fails.
    pub fn get_schema(
        &self,
        path: &str,
        with_refs: bool,
        resolved: bool,
        principal: &Principal,
    ) -> Result<Arc<Value>, SchemaError> {
        let key = CacheKey::new(path, with_refs, resolved, principal.clone());
        if let Some(schema) = self.cache.get(&key) {
            tracing::debug!(path, with_refs, resolved, %principal, "schema cache hit");
            return Ok(schema);
        }
        tracing::debug!(path, with_refs, resolved, %principal, "schema cache miss");

        let url = self.mapper.path_to_url(path)?;
        let mut schema = self
            .loader
            .load(&url)
            .map_err(|source| SchemaError::NotFound {
                url: url.clone(),
                source,
            })?;

        if with_refs {
            schema = inline_refs(&schema, &url, self.loader.as_ref())?;
        }
        if resolved {
            schema = self.transform.transform(schema)?;
        }

        let schema = Arc::new(schema);
        self.cache.put(key, Arc::clone(&schema));
        Ok(schema)
    }

    /// See [`PathUrlMapper::path_to_url`].
    pub fn path_to_url(&self, path: &str) -> Result<String, RoutingError> {
        self.mapper.path_to_url(path)
    }

    /// See [`PathUrlMapper::url_to_path`].
    pub fn url_to_path(&self, url: &str) -> Option<String> {
        self.mapper.url_to_path(url)
    }

    /// Schema paths the loader can enumerate.
    pub fn list_schemas(&self) -> Vec<String> {
        self.loader.list_schemas()
    }

    pub fn mapper(&self) -> &PathUrlMapper {
        &self.mapper
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Builder for [`SchemaService`].
pub struct SchemaServiceBuilder {
    mapper: PathUrlMapper,
    loader: Arc<dyn SchemaLoader>,
    transform: Arc<dyn SchemaTransform>,
    cache_capacity: usize,
}

impl SchemaServiceBuilder {
    /// Set the resolve-mode transform.
    pub fn transform(mut self, transform: Arc<dyn SchemaTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Set the maximum number of cached results (zero means the default).
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> SchemaService {
        SchemaService {
            mapper: self.mapper,
            loader: self.loader,
            transform: self.transform,
            cache: ResolutionCache::new(self.cache_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::routing::{RoutingRule, UrlScheme};
    use serde_json::json;

    fn service(loader: MemoryLoader) -> SchemaService {
        let rule = RoutingRule::new("/schemas", "example.org").unwrap();
        let mapper = PathUrlMapper::new(rule, UrlScheme::Https).unwrap();
        SchemaService::builder(mapper, Arc::new(loader)).build()
    }

    #[test]
    fn raw_schema_is_served_unchanged() {
        let schema = json!({ "properties": { "a": { "$ref": "#/definitions/a" } } });
        let service = service(
            MemoryLoader::new().with_schema("https://example.org/schemas/x.json", schema.clone()),
        );
        let result = service
            .get_schema("x.json", false, false, &Principal::Anonymous)
            .unwrap();
        assert_eq!(*result, schema);
    }

    #[test]
    fn resolved_without_refs_transforms_raw_document() {
        let service = service(MemoryLoader::new().with_schema(
            "https://example.org/schemas/x.json",
            json!({
                "allOf": [{ "$ref": "#/definitions/a" }],
                "definitions": { "a": { "type": "string" } }
            }),
        ));
        // The $ref branch is merged verbatim because inlining did not run
        let result = service
            .get_schema("x.json", false, true, &Principal::Anonymous)
            .unwrap();
        assert_eq!(result["$ref"], "#/definitions/a");
    }

    #[test]
    fn routing_errors_surface() {
        let service = service(MemoryLoader::new());
        let err = service
            .get_schema("/abs.json", false, false, &Principal::Anonymous)
            .unwrap_err();
        assert!(matches!(err, SchemaError::Routing(RoutingError::AbsolutePath { .. })));
    }

    #[test]
    fn failures_are_not_cached() {
        let service = service(MemoryLoader::new());
        assert!(service
            .get_schema("x.json", false, false, &Principal::Anonymous)
            .is_err());
        assert_eq!(service.cache_stats().entries, 0);
    }

    #[test]
    fn delegates_url_mapping() {
        let service = service(MemoryLoader::new());
        let url = service.path_to_url("a/b.json").unwrap();
        assert_eq!(url, "https://example.org/schemas/a/b.json");
        assert_eq!(service.url_to_path(&url), Some("a/b.json".to_string()));
        assert!(service.list_schemas().is_empty());
    }
}
