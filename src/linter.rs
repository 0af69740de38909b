//! Registry linting - static analysis of registry documents.
//!
//! Validates registry files for:
//! - JSON syntax errors
//! - Invalid type and field definitions
//! - Type references that do not resolve
//! - Suspicious but legal shapes (single-variant unions, records with no
//!   public fields)

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::RegistryError;
use crate::loader::{load_json, parse_type_definitions};
use crate::schema::{Registry, TypeDescriptor};

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
    /// JSON path to the issue (e.g., "/types/Task/fields/assignee")
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

/// Result of linting a directory or set of files.
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

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json files.
/// If `strict` is true, warnings are treated as errors.
/// Returns aggregated results for all files.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_registry_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        let file_errors = file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        let file_warnings = file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();

        total_errors += file_errors;
        total_warnings += file_warnings;
        results.push(file_result);
    }

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
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint a single registry file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut diagnostics = Vec::new();

    match load_json(file) {
        Ok(doc) => check_document(&doc, file, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            file: file.to_path_buf(),
            path: "/".to_string(),
            message: format!("syntax error: {}", e),
        }),
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
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics,
    }
}

/// Parse and cross-check a document, then look for warnings.
fn check_document(doc: &serde_json::Value, file: &Path, diagnostics: &mut Vec<Diagnostic>) {
    let error = |code: &str, path: String, message: String| Diagnostic {
        severity: Severity::Error,
        code: code.to_string(),
        file: file.to_path_buf(),
        path,
        message,
    };

    let types = match parse_type_definitions(doc) {
        Ok(types) => types,
        Err(e) => {
            diagnostics.push(error("E002", error_path(&e), e.to_string()));
            return;
        }
    };

    let registry = match Registry::new(types) {
        Ok(registry) => registry,
        Err(e @ RegistryError::UnresolvedType { .. }) => {
            diagnostics.push(error("E003", error_path(&e), e.to_string()));
            return;
        }
        Err(e) => {
            diagnostics.push(error("E002", error_path(&e), e.to_string()));
            return;
        }
    };

    for name in registry.type_names() {
        if let Some(ty) = registry.lookup(name) {
            check_shapes(ty, file, &format!("/types/{}", name), diagnostics);
        }
    }
}

/// Recursively warn about single-variant unions and records with no public fields.
fn check_shapes(ty: &TypeDescriptor, file: &Path, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let warning = |code: &str, message: String| Diagnostic {
        severity: Severity::Warning,
        code: code.to_string(),
        file: file.to_path_buf(),
        path: path.to_string(),
        message,
    };

    match ty {
        TypeDescriptor::Primitive(_) | TypeDescriptor::Named(_) => {}
        TypeDescriptor::Array(inner) => check_shapes(inner, file, path, diagnostics),
        TypeDescriptor::Record(record) => {
            if record.public_fields().next().is_none() {
                diagnostics.push(warning(
                    "W002",
                    "record has no public fields and can never be selected from".to_string(),
                ));
            }
            for field in record.fields.values() {
                let field_path = format!("{}/fields/{}", path, field.name);
                check_shapes(&field.ty, file, &field_path, diagnostics);
            }
        }
        TypeDescriptor::Union(union) => {
            if union.variants.len() == 1 {
                diagnostics.push(warning(
                    "W001",
                    format!(
                        "union has a single variant \"{}\"",
                        union.variant_names().join("")
                    ),
                ));
            }
            for (tag, variant) in &union.variants {
                let variant_path = format!("{}/variants/{}", path, tag);
                check_shapes(variant, file, &variant_path, diagnostics);
            }
        }
    }
}

fn error_path(err: &RegistryError) -> String {
    match err {
        RegistryError::InvalidType { path, .. } | RegistryError::UnresolvedType { path, .. } => {
            path.clone()
        }
        _ => "/".to_string(),
    }
}

/// Collect all .json files in a path (file or directory).
fn collect_registry_files(path: &Path) -> Vec<PathBuf> {
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
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn lint_str(content: &str) -> FileResult {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        lint_file(file.path(), file.path().parent().unwrap())
    }

    #[test]
    fn lint_valid_registry() {
        let result = lint_str(
            r#"{
            "types": {
                "User": { "fields": { "id": "uuid", "name": "string" } },
                "Task": { "fields": { "owner": { "kind": "relation", "type": "User" } } }
            }
        }"#,
        );
        assert_eq!(result.status, FileStatus::Ok);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn lint_invalid_json_syntax() {
        let result = lint_str("{ not valid json }");
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "E001");
    }

    #[test]
    fn lint_invalid_field_kind() {
        let result = lint_str(
            r#"{ "types": { "Task": { "fields": { "id": { "type": "uuid", "kind": "magic" } } } } }"#,
        );
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics[0].code, "E002");
        assert_eq!(result.diagnostics[0].path, "/types/Task/fields/id/kind");
    }

    #[test]
    fn lint_missing_types_section() {
        let result = lint_str(r#"{ "models": {} }"#);
        assert_eq!(result.diagnostics[0].code, "E002");
    }

    #[test]
    fn lint_unresolved_reference() {
        let result = lint_str(
            r#"{ "types": { "Task": { "fields": { "owner": { "kind": "relation", "type": "Ghost" } } } } }"#,
        );
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics[0].code, "E003");
    }

    #[test]
    fn lint_single_variant_union() {
        let result = lint_str(
            r#"{ "types": { "Value": { "variants": { "amount": "decimal" } } } }"#,
        );
        assert_eq!(result.status, FileStatus::Warning);
        assert_eq!(result.diagnostics[0].code, "W001");
        assert_eq!(result.diagnostics[0].path, "/types/Value");
    }

    #[test]
    fn lint_record_without_public_fields() {
        let result = lint_str(
            r#"{ "types": { "Secret": { "fields": { "hash": { "type": "string", "visibility": "private" } } } } }"#,
        );
        assert_eq!(result.status, FileStatus::Warning);
        assert!(result.diagnostics.iter().any(|d| d.code == "W002"));
    }

    #[test]
    fn lint_nested_inline_warning() {
        let result = lint_str(
            r#"{ "types": { "Task": { "fields": { "meta": { "fields": {} } } } } }"#,
        );
        let warning = result.diagnostics.iter().find(|d| d.code == "W002").unwrap();
        assert_eq!(warning.path, "/types/Task/fields/meta");
    }

    #[test]
    fn lint_directory() {
        let dir = tempdir().unwrap();

        std::fs::write(
            dir.path().join("valid.json"),
            r#"{"types": {"User": {"fields": {"id": "uuid"}}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("invalid.json"), "{ not json }").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.is_ok());
    }

    #[test]
    fn lint_strict_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("registry.json");
        std::fs::write(
            &file_path,
            r#"{"types": {"Value": {"variants": {"amount": "decimal"}}}}"#,
        )
        .unwrap();

        let result = lint(&file_path, false);
        assert_eq!(result.files_checked, 1);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 0);

        let result = lint(&file_path, true);
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 1);
    }
}
