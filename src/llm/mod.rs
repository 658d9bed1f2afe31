//! LLM provider abstraction layer
//!
//! This module provides a provider-agnostic interface for model interactions
//! with a Vertex AI Gemini backend.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
