//! Storage upload notification relay
//!
//! Turns a "new object" event into two authenticated calls against the agent
//! service: create the session, then submit the document URI as a message.

pub mod event;
pub mod handler;
pub mod server;

pub use event::{EventError, StorageObjectEvent};
pub use handler::{EventRelay, RelayError, RelayOutcome, RelayStage};
