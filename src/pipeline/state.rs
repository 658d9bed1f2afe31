//! Per-run pipeline state
//!
//! A string map threaded by `&mut` through every step of one run. Steps only
//! ever add or overwrite keys; nothing is removed until the run ends.

use super::error::PipelineError;
use super::Stage;
use crate::storage::ObjectLocation;
use std::collections::HashMap;
use uuid::Uuid;

/// Product identifier written by the extractor
pub const PRODUCT_KEY: &str = "product";
/// Comparison summary written by the comparator
pub const ANALYSIS_KEY: &str = "analysis";
/// Normalized hold decision written by the decider
pub const PRODUCT_HOLD_KEY: &str = "product_hold";

#[derive(Debug, Clone)]
pub struct PipelineState {
    run_id: Uuid,
    document: ObjectLocation,
    values: HashMap<String, String>,
}

impl PipelineState {
    pub fn new(document: ObjectLocation) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            document,
            values: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The COA document this run was started for
    pub fn document(&self) -> &ObjectLocation {
        &self.document
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Read a key a step depends on; absence fails that step
    pub fn require(&self, stage: Stage, key: &'static str) -> Result<&str, PipelineError> {
        self.get(key).ok_or(PipelineError::MissingState { stage, key })
    }

    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    pub fn into_values(self) -> HashMap<String, String> {
        self.values
    }
}
