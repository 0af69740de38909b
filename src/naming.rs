//! Field naming conventions.
//!
//! Internal field names live in the registry. Clients see them converted by
//! the convention configured for each direction, unless a field declares an
//! explicit alias.

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// A key naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NamingConvention {
    /// `priorityScore`
    #[default]
    #[serde(rename = "camelCase")]
    CamelCase,
    /// `priority_score`
    #[serde(rename = "snake_case")]
    SnakeCase,
    /// `PriorityScore`
    #[serde(rename = "PascalCase")]
    PascalCase,
    /// `priority-score`
    #[serde(rename = "kebab-case")]
    KebabCase,
    /// Names are used exactly as registered.
    #[serde(rename = "preserve")]
    Preserve,
}

impl NamingConvention {
    /// Parse a convention name as accepted on the command line and in config files.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "camelCase" | "camel" => Some(NamingConvention::CamelCase),
            "snake_case" | "snake" => Some(NamingConvention::SnakeCase),
            "PascalCase" | "pascal" => Some(NamingConvention::PascalCase),
            "kebab-case" | "kebab" => Some(NamingConvention::KebabCase),
            "preserve" => Some(NamingConvention::Preserve),
            _ => None,
        }
    }

    /// Canonical name of the convention.
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingConvention::CamelCase => "camelCase",
            NamingConvention::SnakeCase => "snake_case",
            NamingConvention::PascalCase => "PascalCase",
            NamingConvention::KebabCase => "kebab-case",
            NamingConvention::Preserve => "preserve",
        }
    }

    /// Convert an internal name into this convention.
    ///
    /// Punctuation such as a trailing `?` is a word boundary and is dropped,
    /// so `is_active?` becomes `isActive` in camelCase.
    pub fn apply(&self, name: &str) -> String {
        match self {
            NamingConvention::CamelCase => name.to_lower_camel_case(),
            NamingConvention::SnakeCase => name.to_snake_case(),
            NamingConvention::PascalCase => name.to_upper_camel_case(),
            NamingConvention::KebabCase => name.to_kebab_case(),
            NamingConvention::Preserve => name.to_string(),
        }
    }
}

impl std::fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NamingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "unknown naming convention \"{}\": expected camelCase, snake_case, PascalCase, kebab-case, or preserve",
                s
            )
        })
    }
}
