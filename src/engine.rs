//! Request pipeline: normalize, plan, fetch, project.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{EngineError, PlanError};
use crate::planner::{plan_with_policy, FetchPlan};
use crate::policy::{AccessPolicy, AllowAll};
use crate::projector::project;
use crate::provider::DataProvider;
use crate::schema::Registry;
use crate::selection::parse_selection;
use crate::template::ProjectionTemplate;
use crate::types::PlanOptions;

/// A client request: a root type and its field selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub type_name: String,
    pub fields: Value,
}

impl Request {
    pub fn new(type_name: impl Into<String>, fields: Value) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }
}

/// Normalize and plan a selection without executing it.
///
/// # Errors
///
/// Returns the first `PlanError` found in the selection.
pub fn prepare(
    registry: &Registry,
    type_name: &str,
    fields: &Value,
    options: &PlanOptions,
    policy: &dyn AccessPolicy,
) -> Result<(FetchPlan, ProjectionTemplate), PlanError> {
    let selection = parse_selection(fields, options.max_depth)?;
    plan_with_policy(registry, type_name, &selection, options, policy)
}

/// Run a request end to end, allowing every field.
///
/// # Errors
///
/// `EngineError::Plan` if the selection is invalid (the provider is not
/// called), `EngineError::Provider` if fetching fails.
pub fn run(
    registry: &Registry,
    request: &Request,
    provider: &dyn DataProvider,
    options: &PlanOptions,
) -> Result<Value, EngineError> {
    run_with_policy(registry, request, provider, options, &AllowAll)
}

/// Run a request end to end under an access policy.
pub fn run_with_policy(
    registry: &Registry,
    request: &Request,
    provider: &dyn DataProvider,
    options: &PlanOptions,
    policy: &dyn AccessPolicy,
) -> Result<Value, EngineError> {
    let span = tracing::debug_span!("request", type_name = %request.type_name);
    let _enter = span.enter();

    let (plan, template) = prepare(registry, &request.type_name, &request.fields, options, policy)
        .map_err(|e| {
            tracing::debug!(error = %e, "request rejected");
            e
        })?;

    let raw = provider.execute(&plan).map_err(|e| {
        tracing::warn!(error = %e, "data provider failed");
        e
    })?;

    Ok(project(&raw, &template, registry, &options.naming))
}
