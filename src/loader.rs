//! Schema loading from various sources.
//!
//! The [`SchemaLoader`] trait is the single seam through which documents
//! enter the crate: the service loads the requested schema through it and the
//! reference inliner fetches every referenced document through it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{LoadError, ResolveError};
use crate::routing::{validate_path, PathUrlMapper};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves a schema URL to its raw document.
///
/// Results are cached and shared between callers, so implementations must
/// not depend on call order or keep per-call mutable state.
pub trait SchemaLoader: Send + Sync {
    /// Load the document at `url`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::NotFound` when no document exists at that URL.
    fn load(&self, url: &str) -> Result<Value, LoadError>;

    /// Schema paths this loader can enumerate. Most loaders cannot.
    fn list_schemas(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Serves schemas from a directory, addressed through the routing rule.
///
/// `https://{host}{endpoint}/a/b.json` is read from `{root}/a/b.json`; URLs
/// the mapper does not recognize are not found.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
    mapper: PathUrlMapper,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>, mapper: PathUrlMapper) -> Self {
        Self {
            root: root.into(),
            mapper,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SchemaLoader for FileSystemLoader {
    fn load(&self, url: &str) -> Result<Value, LoadError> {
        let not_found = || LoadError::NotFound {
            url: url.to_string(),
        };
        let path = self.mapper.url_to_path(url).ok_or_else(not_found)?;
        let file = self.root.join(&path);
        if !file.is_file() {
            return Err(not_found());
        }
        tracing::debug!(url, file = %file.display(), "loading schema file");
        load_schema(&file)
    }

    fn list_schemas(&self) -> Vec<String> {
        collect_schema_files(&self.root)
            .iter()
            .filter_map(|file| {
                let relative = file.strip_prefix(&self.root).ok()?;
                let path = relative
                    .components()
                    .map(|c| c.as_os_str().to_str())
                    .collect::<Option<Vec<_>>>()?
                    .join("/");
                validate_path(&path).ok().map(|_| path)
            })
            .collect()
    }
}

/// Fixed table of documents keyed by absolute URL.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: HashMap<String, Value>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, builder style.
    pub fn with_schema(mut self, url: impl Into<String>, schema: Value) -> Self {
        self.insert(url, schema);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, schema: Value) {
        self.documents.insert(url.into(), schema);
    }
}

impl SchemaLoader for MemoryLoader {
    fn load(&self, url: &str) -> Result<Value, LoadError> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                url: url.to_string(),
            })
    }
}

/// Fetches schemas over HTTP(S).
///
/// Requires the `remote` feature (enabled by default). Uses a blocking
/// client; callers on an async runtime must run it on a blocking thread.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpLoader {
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
impl SchemaLoader for HttpLoader {
    fn load(&self, url: &str) -> Result<Value, LoadError> {
        tracing::debug!(url, "fetching schema");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| LoadError::NetworkError {
                url: url.to_string(),
                source,
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound {
                url: url.to_string(),
            });
        }

        // Check for HTTP errors before parsing
        let response = response
            .error_for_status()
            .map_err(|source| LoadError::NetworkError {
                url: url.to_string(),
                source,
            })?;

        let body = response.text().map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

        serde_json::from_str(&body).map_err(|source| LoadError::InvalidJson {
            url: url.to_string(),
            source,
        })
    }
}

/// Load a schema from a file path.
///
/// # Errors
///
/// Returns `LoadError::NotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            url: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson {
        url: path.display().to_string(),
        source,
    })
}

/// Navigate a JSON Pointer fragment (e.g., "#/definitions/foo" or "/properties/bar").
///
/// An empty fragment (or a bare "#") addresses the whole document.
/// Plain-name anchors are not supported.
pub fn navigate_fragment<'v>(schema: &'v Value, fragment: &str) -> Result<&'v Value, ResolveError> {
    let pointer = fragment.strip_prefix('#').unwrap_or(fragment);
    if pointer.is_empty() {
        return Ok(schema);
    }
    if !pointer.starts_with('/') {
        return Err(ResolveError::FragmentNotFound {
            reference: format!("#{}", pointer),
        });
    }
    schema
        .pointer(pointer)
        .ok_or_else(|| ResolveError::FragmentNotFound {
            reference: format!("#{}", pointer),
        })
}

/// Recursively collect `*.json` files below `path`, sorted.
pub(crate) fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RoutingRule, UrlScheme};
    use serde_json::json;
    use std::fs;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn mapper() -> PathUrlMapper {
        let rule = RoutingRule::new("/schemas", "example.org").unwrap();
        PathUrlMapper::new(rule, UrlScheme::Https).unwrap()
    }

    #[test]
    fn load_schema_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "object"}}"#).unwrap();

        let schema = load_schema(file.path()).unwrap();
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn load_schema_file_not_found() {
        let result = load_schema(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn load_schema_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_schema(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn navigate_fragment_pointer() {
        let schema = json!({
            "definitions": { "a/b": { "type": "string" }, "list": [1, {"x": true}] }
        });
        assert_eq!(
            navigate_fragment(&schema, "#/definitions/a~1b").unwrap(),
            &json!({ "type": "string" })
        );
        assert_eq!(
            navigate_fragment(&schema, "/definitions/list/1/x").unwrap(),
            &json!(true)
        );
        assert_eq!(navigate_fragment(&schema, "#").unwrap(), &schema);
        assert_eq!(navigate_fragment(&schema, "").unwrap(), &schema);
    }

    #[test]
    fn navigate_fragment_missing() {
        let schema = json!({ "definitions": {} });
        assert!(matches!(
            navigate_fragment(&schema, "#/definitions/nope"),
            Err(ResolveError::FragmentNotFound { .. })
        ));
        assert!(matches!(
            navigate_fragment(&schema, "#anchor"),
            Err(ResolveError::FragmentNotFound { .. })
        ));
    }

    #[test]
    fn filesystem_loader_reads_mapped_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("records")).unwrap();
        fs::write(
            dir.path().join("records/record-v1.0.0.json"),
            r#"{"type": "object"}"#,
        )
        .unwrap();

        let loader = FileSystemLoader::new(dir.path(), mapper());
        let schema = loader
            .load("https://example.org/schemas/records/record-v1.0.0.json")
            .unwrap();
        assert_eq!(schema, json!({ "type": "object" }));
    }

    #[test]
    fn filesystem_loader_not_found() {
        let dir = tempdir().unwrap();
        let loader = FileSystemLoader::new(dir.path(), mapper());

        let err = loader
            .load("https://example.org/schemas/missing.json")
            .unwrap_err();
        assert!(err.is_not_found());

        // Foreign host never reaches the filesystem
        let err = loader.load("https://other.org/schemas/a.json").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn filesystem_loader_directory_is_not_a_schema() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("records")).unwrap();
        let loader = FileSystemLoader::new(dir.path(), mapper());
        assert!(loader
            .load("https://example.org/schemas/records")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn filesystem_loader_lists_schemas() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("records/nested")).unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("records/b.json"), "{}").unwrap();
        fs::write(dir.path().join("records/nested/c.json"), "{}").unwrap();
        fs::write(dir.path().join("records/readme.txt"), "").unwrap();
        fs::write(dir.path().join("records/has space.json"), "{}").unwrap();

        let loader = FileSystemLoader::new(dir.path(), mapper());
        assert_eq!(
            loader.list_schemas(),
            vec!["a.json", "records/b.json", "records/nested/c.json"]
        );
    }

    #[test]
    fn memory_loader() {
        let loader = MemoryLoader::new().with_schema("https://x/a.json", json!({"type": "null"}));
        assert_eq!(loader.load("https://x/a.json").unwrap()["type"], "null");
        assert!(loader.load("https://x/b.json").unwrap_err().is_not_found());
        assert!(loader.list_schemas().is_empty());
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn http_loader_fetches_json() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/schemas/a.json")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"type": "string"}"#)
                .create();

            let loader = HttpLoader::new().unwrap();
            let schema = loader
                .load(&format!("{}/schemas/a.json", server.url()))
                .unwrap();
            assert_eq!(schema, json!({ "type": "string" }));
            mock.assert();
        }

        #[test]
        fn http_loader_404_is_not_found() {
            let mut server = mockito::Server::new();
            let _mock = server
                .mock("GET", "/schemas/missing.json")
                .with_status(404)
                .create();

            let loader = HttpLoader::new().unwrap();
            let err = loader
                .load(&format!("{}/schemas/missing.json", server.url()))
                .unwrap_err();
            assert!(err.is_not_found());
        }

        #[test]
        fn http_loader_server_error() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/a.json").with_status(500).create();

            let loader = HttpLoader::new().unwrap();
            let err = loader.load(&format!("{}/a.json", server.url())).unwrap_err();
            assert!(matches!(err, LoadError::NetworkError { .. }));
        }

        #[test]
        fn http_loader_invalid_json() {
            let mut server = mockito::Server::new();
            let _mock = server
                .mock("GET", "/a.json")
                .with_status(200)
                .with_body("<html>")
                .create();

            let loader = HttpLoader::new().unwrap();
            let err = loader.load(&format!("{}/a.json", server.url())).unwrap_err();
            assert!(matches!(err, LoadError::InvalidJson { .. }));
        }
    }
}
