//! Core types shared by the planner, formatter and projector.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::naming::NamingConvention;

/// Default maximum nesting depth of a selection.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Keys of the structured selection object used by argument-taking fields.
pub const SELECTION_OBJECT_KEYS: &[&str] = &["arguments", "fields"];

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

/// Direction of a value transformation.
///
/// `Input` converts client data into the internal representation,
/// `Output` converts internal data into what the client receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Create direction from an input flag (true = Input, false = Output).
    pub fn from_input_flag(is_input: bool) -> Self {
        if is_input {
            Direction::Input
        } else {
            Direction::Output
        }
    }
}

/// Visibility of a field to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Selectable and emitted.
    #[default]
    Public,
    /// Never selectable; dropped by the formatter in both directions.
    Private,
}

impl Visibility {
    /// Parse a visibility value from a string.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Naming conventions for both data directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Convention the client uses for keys it sends (selection names, arguments, payloads).
    pub input: NamingConvention,
    /// Convention applied to keys emitted in responses.
    pub output: NamingConvention,
}

impl FormatOptions {
    /// Use the same convention in both directions.
    pub fn new(convention: NamingConvention) -> Self {
        Self {
            input: convention,
            output: convention,
        }
    }

    /// Set the inbound convention.
    pub fn input(mut self, convention: NamingConvention) -> Self {
        self.input = convention;
        self
    }

    /// Set the outbound convention.
    pub fn output(mut self, convention: NamingConvention) -> Self {
        self.output = convention;
        self
    }

    /// Returns the convention active for `direction`.
    pub fn convention(&self, direction: Direction) -> NamingConvention {
        match direction {
            Direction::Input => self.input,
            Direction::Output => self.output,
        }
    }
}

/// Options for normalizing and planning a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    /// Naming conventions for requests and responses.
    pub naming: FormatOptions,
    /// Maximum nesting depth of the selection; deeper requests are rejected
    /// before planning starts.
    pub max_depth: usize,
    /// When true, a field denied by the access policy aborts the request with
    /// `FieldAccessDenied` instead of resolving to null.
    pub strict_access: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            naming: FormatOptions::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            strict_access: false,
        }
    }
}

impl PlanOptions {
    /// Create plan options with the given naming conventions.
    pub fn new(naming: FormatOptions) -> Self {
        Self {
            naming,
            ..Self::default()
        }
    }

    /// Set the maximum selection depth.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set strict access mode (denied fields become errors).
    pub fn strict_access(mut self, strict: bool) -> Self {
        self.strict_access = strict;
        self
    }
}
