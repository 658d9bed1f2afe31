//! Agent service hosting the hold pipeline over HTTP

pub mod routes;
pub mod sessions;

pub use routes::{event_stream, routes, serve, AgentService, EVENT_STREAM_CONTENT_TYPE};
pub use sessions::{Session, SessionStore};
