//! Error types for registry loading, selection planning and execution.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Render a selection path for error messages (`assignee.name`).
pub fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

/// Errors while loading or building the type schema registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("invalid type definition at {path}: {message}")]
    InvalidType { path: String, message: String },

    #[error("unresolved type reference \"{name}\" at {path}")]
    UnresolvedType { path: String, name: String },

    #[error("type alias cycle through \"{name}\"")]
    AliasCycle { name: String },
}

impl RegistryError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RegistryError::FileNotFound { .. } | RegistryError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            RegistryError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Validation errors raised while normalizing or planning a selection.
///
/// Every variant carries the path of requested names from the request root
/// to the offending node. Planning stops at the first error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("unknown field \"{field}\" at {}", display_path(path))]
    UnknownField { path: Vec<String>, field: String },

    #[error("invalid selection at {}: {message}", display_path(path))]
    InvalidNestedSelectionShape { path: Vec<String>, message: String },

    #[error("missing required argument \"{argument}\" at {}", display_path(path))]
    MissingRequiredArgument { path: Vec<String>, argument: String },

    #[error("invalid argument \"{argument}\" at {}: {message}", display_path(path))]
    ArgumentTypeMismatch {
        path: Vec<String>,
        argument: String,
        message: String,
    },

    #[error(
        "unknown union variant \"{variant}\" at {}: expected one of {}",
        display_path(path),
        expected.join(", ")
    )]
    InvalidUnionVariant {
        path: Vec<String>,
        variant: String,
        expected: Vec<String>,
    },

    #[error("access denied to field at {}", display_path(path))]
    FieldAccessDenied { path: Vec<String> },

    #[error("selection at {} exceeds maximum depth of {max}", display_path(path))]
    DepthExceeded { path: Vec<String>, max: usize },

    #[error("type \"{name}\" used at {} is not registered", display_path(path))]
    UnresolvedType { path: Vec<String>, name: String },
}

/// Serializable form of a [`PlanError`] for JSON error output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub path: Vec<String>,
    pub message: String,
}

impl PlanError {
    /// Path from the request root to the offending node.
    pub fn path(&self) -> &[String] {
        match self {
            PlanError::UnknownField { path, .. }
            | PlanError::InvalidNestedSelectionShape { path, .. }
            | PlanError::MissingRequiredArgument { path, .. }
            | PlanError::ArgumentTypeMismatch { path, .. }
            | PlanError::InvalidUnionVariant { path, .. }
            | PlanError::FieldAccessDenied { path }
            | PlanError::DepthExceeded { path, .. }
            | PlanError::UnresolvedType { path, .. } => path,
        }
    }

    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::UnknownField { .. } => "UnknownField",
            PlanError::InvalidNestedSelectionShape { .. } => "InvalidNestedSelectionShape",
            PlanError::MissingRequiredArgument { .. } => "MissingRequiredArgument",
            PlanError::ArgumentTypeMismatch { .. } => "ArgumentTypeMismatch",
            PlanError::InvalidUnionVariant { .. } => "InvalidUnionVariant",
            PlanError::FieldAccessDenied { .. } => "FieldAccessDenied",
            PlanError::DepthExceeded { .. } => "DepthExceeded",
            PlanError::UnresolvedType { .. } => "UnresolvedType",
        }
    }

    /// Build the serializable report for this error.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            path: self.path().to_vec(),
            message: self.to_string(),
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlanError::UnresolvedType { .. } => 2,
            _ => 1,
        }
    }
}

/// Failure reported by a data provider. Passed through to the caller unchanged.
#[derive(Debug, Error)]
#[error("data provider failed: {message}")]
pub struct ProviderError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Create a provider error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a provider error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors from running a full request.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EngineError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Plan(e) => e.exit_code(),
            EngineError::Provider(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn registry_error_exit_codes() {
        let err = RegistryError::FileNotFound {
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = RegistryError::InvalidType {
            path: "/types/Task".into(),
            message: "expected object".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn plan_error_display_includes_path() {
        let err = PlanError::UnknownField {
            path: path(&["assignee", "bogus"]),
            field: "bogus".into(),
        };
        assert_eq!(err.to_string(), "unknown field \"bogus\" at assignee.bogus");
    }

    #[test]
    fn plan_error_display_lists_variants() {
        let err = PlanError::InvalidUnionVariant {
            path: path(&["content", "video"]),
            variant: "video".into(),
            expected: vec!["text".into(), "image".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown union variant \"video\" at content.video: expected one of text, image"
        );
    }

    #[test]
    fn plan_error_report() {
        let err = PlanError::MissingRequiredArgument {
            path: path(&["summary"]),
            argument: "verbosity".into(),
        };
        let report = err.report();
        assert_eq!(report.kind, "MissingRequiredArgument");
        assert_eq!(report.path, path(&["summary"]));
        assert!(report.message.contains("verbosity"));
    }

    #[test]
    fn empty_path_renders_root() {
        assert_eq!(display_path(&[]), "<root>");
    }

    #[test]
    fn engine_error_exit_codes() {
        let err: EngineError = PlanError::FieldAccessDenied {
            path: path(&["secret"]),
        }
        .into();
        assert_eq!(err.exit_code(), 1);

        let err: EngineError = ProviderError::new("connection reset").into();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "data provider failed: connection reset");
    }
}
