//! Schema linting - static analysis of a schema directory.
//!
//! Every `*.json` file below the root is loaded the way the service would
//! serve it and checked for:
//! - JSON syntax errors
//! - broken `$ref` references (document or fragment not found)
//! - documents that are not valid JSON Schemas once references are inlined
//! - cyclic references that inlining has to leave in place

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::loader::{collect_schema_files, load_schema, FileSystemLoader};
use crate::refs::{has_refs, inline_refs};
use crate::routing::PathUrlMapper;
use crate::types::REF_KEY;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/properties/id")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a schema directory.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint every schema below `root`, resolving URLs through `mapper`.
///
/// If `strict` is true, files with warnings count as failed.
pub fn lint(root: &Path, mapper: &PathUrlMapper, strict: bool) -> LintResult {
    let loader = FileSystemLoader::new(root, mapper.clone());
    let files = collect_schema_files(root);
    let results: Vec<FileResult> = files
        .iter()
        .map(|file| lint_file(file, root, mapper, &loader))
        .collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: root.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single schema file below `root`.
pub fn lint_file(
    file: &Path,
    root: &Path,
    mapper: &PathUrlMapper,
    loader: &FileSystemLoader,
) -> FileResult {
    let relative = file.strip_prefix(root).unwrap_or(file).to_path_buf();
    let mut diagnostics = Vec::new();
    let mut diagnostic = |severity: Severity, code: &str, path: &str, message: String| {
        diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: relative.clone(),
            path: path.to_string(),
            message,
        });
    };

    // Try to load the file (checks syntax)
    match load_schema(file) {
        Err(e) => diagnostic(Severity::Error, "E001", "/", format!("syntax error: {}", e)),
        Ok(schema) => {
            let schema_path = relative
                .to_str()
                .map(|p| p.replace(std::path::MAIN_SEPARATOR, "/"))
                .unwrap_or_default();
            match mapper.path_to_url(&schema_path) {
                Err(e) => diagnostic(
                    Severity::Warning,
                    "W002",
                    "/",
                    format!("schema cannot be served: {}", e),
                ),
                Ok(url) => match inline_refs(&schema, &url, loader) {
                    Err(e) => diagnostic(
                        Severity::Error,
                        "E002",
                        "/",
                        format!("broken reference: {}", e),
                    ),
                    Ok(inlined) if has_refs(&inlined) => {
                        let at = first_ref_path(&inlined, "").unwrap_or_else(|| "/".to_string());
                        diagnostic(
                            Severity::Warning,
                            "W001",
                            &at,
                            "cyclic reference left in place when inlining".to_string(),
                        );
                    }
                    Ok(inlined) => {
                        if let Err(e) = jsonschema::validator_for(&inlined) {
                            diagnostic(
                                Severity::Error,
                                "E003",
                                "/",
                                format!("invalid schema: {}", e),
                            );
                        }
                    }
                },
            }
        }
    }

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: relative,
        status,
        diagnostics,
    }
}

/// JSON path of the first `$ref` object left in a tree.
fn first_ref_path(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::Object(map) => {
            if matches!(map.get(REF_KEY), Some(Value::String(_))) {
                return Some(if path.is_empty() { "/".to_string() } else { path.to_string() });
            }
            map.iter()
                .find_map(|(key, val)| first_ref_path(val, &format!("{}/{}", path, key)))
        }
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .find_map(|(i, item)| first_ref_path(item, &format!("{}/{}", path, i))),
        _ => None,
    }
}
