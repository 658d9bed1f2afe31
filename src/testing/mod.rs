//! Testing utilities and mock implementations
//!
//! Mocks for the model, object storage and credential seams so the pipeline
//! and relay can run without Google Cloud.

pub mod mocks;

pub use mocks::*;
