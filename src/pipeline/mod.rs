//! Hold-decision pipeline
//!
//! Four model-backed steps run in a fixed order against one shared
//! [`PipelineState`]: extract the product number, compare the COA against its
//! spec sheet, decide whether to hold, and record the hold.

pub mod error;
pub mod gate;
pub mod runner;
pub mod stage;
pub mod state;
pub mod steps;

pub use error::PipelineError;
pub use gate::{GateDecision, HoldGate, SKIP_RECORD_MESSAGE};
pub use runner::{HoldPipeline, PipelineRun, PipelineSettings};
pub use stage::{Stage, StepReport, StepStatus};
pub use state::{PipelineState, ANALYSIS_KEY, PRODUCT_HOLD_KEY, PRODUCT_KEY};
pub use steps::{
    DocumentComparator, HoldDecider, HoldRecorder, ModelSettings, PipelineStep,
    ProductNumberExtractor,
};
