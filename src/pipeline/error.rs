use super::Stage;
use crate::llm::provider::LlmError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid document reference: {0}")]
    InvalidDocument(#[source] StorageError),

    #[error("{stage}: model call failed: {source}")]
    Llm {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("{stage}: storage operation failed: {source}")]
    Storage {
        stage: Stage,
        #[source]
        source: StorageError,
    },

    #[error("{stage}: state key '{key}' has not been set")]
    MissingState { stage: Stage, key: &'static str },

    #[error("{stage}: model returned an empty response")]
    EmptyResponse { stage: Stage },
}

impl PipelineError {
    /// Stage the failure happened in, if it happened inside a step
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::InvalidDocument(_) => None,
            PipelineError::Llm { stage, .. }
            | PipelineError::Storage { stage, .. }
            | PipelineError::MissingState { stage, .. }
            | PipelineError::EmptyResponse { stage } => Some(*stage),
        }
    }
}
