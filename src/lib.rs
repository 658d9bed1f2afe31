//! COA hold agent
//!
//! Checks a certificate of analysis (COA) against the product's spec sheet
//! with a Gemini model and records non-conforming products in a hold ledger.
//!
//! # Overview
//!
//! - [`pipeline`]: the four-step hold pipeline and its state machine
//! - [`ledger`]: the flat-file hold ledger in object storage
//! - [`service`]: HTTP agent service hosting sessions and pipeline runs
//! - [`relay`]: Cloud Storage event relay that feeds the agent service
//! - [`llm`], [`storage`], [`auth`]: collaborator traits and their Google Cloud
//!   implementations
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use coa_agent::pipeline::{HoldPipeline, ModelSettings, PipelineSettings};
//! use coa_agent::testing::{MemoryObjectStore, MockLlmProvider};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = Arc::new(MockLlmProvider::new(vec![
//!     "A-100".to_string(),
//!     "pH 7.9 is above the 7.5 limit.".to_string(),
//!     "True".to_string(),
//! ]));
//! let settings = PipelineSettings {
//!     model: ModelSettings::new("gemini-2.5-flash"),
//!     base_location: "gs://coa-docs".to_string(),
//!     ledger_object: "/product_holds.txt".to_string(),
//! };
//! let store = Arc::new(MemoryObjectStore::new());
//! store.insert(&settings.ledger_location(), "");
//!
//! let pipeline = HoldPipeline::new(llm, store, settings);
//! let run = pipeline.run_uri("gs://coa-docs/incoming/lot-7.pdf").await?;
//! assert!(run.hold_recorded);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod relay;
pub mod service;
pub mod storage;
pub mod testing;

pub use config::{AgentConfig, ConfigError, RelayConfig};
pub use error::{AgentError, AgentResult};
pub use ledger::HoldLedger;
pub use pipeline::{HoldPipeline, PipelineRun, PipelineSettings, Stage, StepReport};
pub use relay::{EventRelay, RelayOutcome};
