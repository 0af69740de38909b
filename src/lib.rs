//! Field Selection & Projection
//!
//! Clients request an arbitrarily nested subset of fields from a typed data
//! model and get exactly that shape back. A request is validated against a
//! type registry and turned into two artifacts in one pass:
//!
//! - a [`FetchPlan`] that tells a [`DataProvider`] what to load (direct
//!   attributes, relations, computed fields with arguments, aggregates);
//! - a [`ProjectionTemplate`] that extracts and formats the requested fields
//!   from whatever the provider returns.
//!
//! # Example
//!
//! ```
//! use field_select::{load_registry_str, run, PlanOptions, Request, StaticProvider};
//! use serde_json::json;
//!
//! let registry = load_registry_str(r#"{
//!     "types": {
//!         "User": { "fields": { "id": "integer", "display_name": "string" } },
//!         "Task": {
//!             "fields": {
//!                 "id": "integer",
//!                 "title": "string",
//!                 "assignee": { "kind": "relation", "type": "User" }
//!             }
//!         }
//!     }
//! }"#).unwrap();
//!
//! let provider = StaticProvider::new(json!({
//!     "id": 1,
//!     "title": "Ship it",
//!     "assignee": { "id": 7, "display_name": "Ada" }
//! }));
//!
//! let request = Request::new("Task", json!(["id", { "assignee": ["displayName"] }]));
//! let response = run(&registry, &request, &provider, &PlanOptions::default()).unwrap();
//!
//! assert_eq!(response, json!({ "id": 1, "assignee": { "displayName": "Ada" } }));
//! ```
//!
//! # Selection Shapes
//!
//! | Item | Meaning |
//! |------|---------|
//! | `"title"` | Plain field |
//! | `{"assignee": ["id"]}` | Nested selection on a relation, record or union |
//! | `{"summary": {"arguments": {...}, "fields": [...]}}` | Computed field with arguments |
//!
//! Field names are matched under the inbound naming convention and emitted
//! under the outbound one (`camelCase` for both by default).

mod engine;
mod error;
mod formatter;
mod linter;
mod loader;
mod naming;
mod pagination;
mod planner;
mod policy;
mod projector;
mod provider;
mod schema;
mod selection;
mod template;
mod types;
mod validator;

pub use engine::{prepare, run, run_with_policy, Request};
pub use error::{display_path, EngineError, ErrorReport, PlanError, ProviderError, RegistryError};
pub use formatter::{format_value, Formatter};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    load_json, load_registry, load_registry_auto, load_registry_str, parse_registry,
};
pub use naming::NamingConvention;
pub use pagination::{detect as detect_envelope, Envelope, PageStyle};
pub use planner::{plan, plan_with_policy, FetchPlan, LoadDirective, Planner, SubPlan};
pub use policy::{AccessPolicy, AllowAll, DenyList};
pub use projector::{project, Projector};
pub use provider::{DataProvider, FileProvider, StaticProvider};
pub use schema::{
    ArgumentSpec, Cardinality, Constraints, FieldDescriptor, FieldKind, Primitive, RecordType,
    Registry, TypeDescriptor, UnionType,
};
pub use selection::{parse_selection, SelectionNode};
pub use template::{NodeKind, ProjectionTemplate, SubTemplate, TemplateNode, UnionTemplate, VariantTemplate};
pub use types::{Direction, FormatOptions, PlanOptions, Visibility, DEFAULT_MAX_DEPTH};
pub use validator::{check_value, validate_arguments};

#[cfg(feature = "remote")]
pub use loader::load_registry_url;
