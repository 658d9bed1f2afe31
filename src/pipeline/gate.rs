//! Guard between the hold decision and the ledger write

use super::state::{PipelineState, PRODUCT_HOLD_KEY};

/// Message returned instead of running the recorder
pub const SKIP_RECORD_MESSAGE: &str =
    "Skipping update product hold database tool as no products meet the hold requirements.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Skip { message: &'static str },
}

/// Decides whether the recorder runs.
///
/// Only the exact string `"false"` short-circuits. Every other value,
/// including unexpected model output and a missing key, lets the recorder
/// proceed.
pub struct HoldGate;

impl HoldGate {
    pub fn evaluate(state: &PipelineState) -> GateDecision {
        match state.get(PRODUCT_HOLD_KEY) {
            Some("false") => GateDecision::Skip {
                message: SKIP_RECORD_MESSAGE,
            },
            _ => GateDecision::Proceed,
        }
    }
}
