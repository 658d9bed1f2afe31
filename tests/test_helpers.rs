//! Test helpers and utilities for integration tests

use coa_agent::config::RelayConfig;
use coa_agent::pipeline::{HoldPipeline, ModelSettings, PipelineSettings};
use coa_agent::storage::ObjectLocation;
use coa_agent::testing::{MemoryObjectStore, MockLlmProvider};
use std::sync::Arc;

pub const BASE_LOCATION: &str = "gs://coa-docs";
pub const DOCUMENT_URI: &str = "gs://coa-docs/incoming/lot-7.pdf";

/// Pipeline settings pointing at the test bucket
#[allow(dead_code)]
pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        model: ModelSettings::new("gemini-2.5-flash"),
        base_location: BASE_LOCATION.to_string(),
        ledger_object: "/product_holds.txt".to_string(),
    }
}

#[allow(dead_code)]
pub fn ledger_location() -> ObjectLocation {
    test_settings().ledger_location()
}

/// Pipeline over scripted model responses and an in-memory store whose
/// ledger already exists with `ledger` as content
#[allow(dead_code)]
pub fn scripted_pipeline(
    responses: &[&str],
    ledger: &str,
) -> (HoldPipeline, Arc<MockLlmProvider>, Arc<MemoryObjectStore>) {
    let llm = Arc::new(MockLlmProvider::new(
        responses.iter().map(|r| r.to_string()).collect(),
    ));
    let store = Arc::new(MemoryObjectStore::new());
    store.insert(&ledger_location(), ledger);

    let pipeline = HoldPipeline::new(llm.clone(), store.clone(), test_settings());
    (pipeline, llm, store)
}

/// Relay configuration targeting a mock server
#[allow(dead_code)]
pub fn relay_config(target_url: &str) -> RelayConfig {
    RelayConfig::default().with_target_url(target_url)
}
