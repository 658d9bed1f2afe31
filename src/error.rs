//! Crate-level error type
//!
//! Collects the per-module errors behind one enum and sanitizes messages
//! before they leave the process over HTTP.

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::llm::provider::LlmError;
use crate::pipeline::PipelineError;
use crate::storage::StorageError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),

    #[error("LLM provider error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl AgentError {
    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// HTTP status the agent service answers with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AgentError::InvalidInput { .. } => 400,
            AgentError::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Error text that is safe to return to a caller
    pub fn public_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret|bearer)[=:\s]\s*[^\s,;]+").expect("valid regex")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid regex")
});

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Sanitize error messages to prevent sensitive data leakage
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
