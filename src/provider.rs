//! The data provider seam: executes a [`FetchPlan`] and returns raw data.
//!
//! The engine never fetches anything itself. Storage access, batching and
//! caching all live behind this trait.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ProviderError;
use crate::planner::FetchPlan;

/// Executes fetch plans.
///
/// The returned value must contain (a superset of) the requested shape,
/// keyed by internal field names, optionally wrapped in a pagination
/// envelope.
pub trait DataProvider {
    fn execute(&self, plan: &FetchPlan) -> Result<Value, ProviderError>;
}

impl<F> DataProvider for F
where
    F: Fn(&FetchPlan) -> Result<Value, ProviderError>,
{
    fn execute(&self, plan: &FetchPlan) -> Result<Value, ProviderError> {
        self(plan)
    }
}

/// Returns the same preloaded value for every plan.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    data: Value,
}

impl StaticProvider {
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

impl DataProvider for StaticProvider {
    fn execute(&self, _plan: &FetchPlan) -> Result<Value, ProviderError> {
        Ok(self.data.clone())
    }
}

/// Reads the raw result from a JSON file on every execution.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataProvider for FileProvider {
    fn execute(&self, plan: &FetchPlan) -> Result<Value, ProviderError> {
        tracing::debug!(path = %self.path.display(), type_name = ?plan.type_name, "reading raw result");
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::with_source(format!("cannot read {}", self.path.display()), e)
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ProviderError::with_source(format!("invalid JSON in {}", self.path.display()), e)
        })
    }
}
