//! Pipeline stages and step reports

use serde::Serialize;
use std::fmt;

/// Named stages of the hold-decision pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractProduct,
    CompareDocuments,
    DecideHold,
    RecordHold,
    Done,
}

impl Stage {
    /// First stage of every run
    pub const START: Stage = Stage::ExtractProduct;

    /// Successor stage; `Done` is terminal
    pub fn next(self) -> Stage {
        match self {
            Stage::ExtractProduct => Stage::CompareDocuments,
            Stage::CompareDocuments => Stage::DecideHold,
            Stage::DecideHold => Stage::RecordHold,
            Stage::RecordHold | Stage::Done => Stage::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ExtractProduct => "extract_product",
            Stage::CompareDocuments => "compare_documents",
            Stage::DecideHold => "decide_hold",
            Stage::RecordHold => "record_hold",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Skipped,
}

/// What a step reports back to the caller once it has run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub stage: Stage,
    pub status: StepStatus,
    pub summary: String,
}

impl StepReport {
    pub fn success(stage: Stage, summary: impl Into<String>) -> Self {
        Self {
            stage,
            status: StepStatus::Success,
            summary: summary.into(),
        }
    }

    pub fn skipped(stage: Stage, summary: impl Into<String>) -> Self {
        Self {
            stage,
            status: StepStatus::Skipped,
            summary: summary.into(),
        }
    }
}
