//! LLM provider implementations
//!
//! Concrete implementations of the LlmProvider trait.

pub mod vertex;

pub use vertex::*;
