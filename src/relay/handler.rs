//! Upload notification to agent-service relay
//!
//! One event runs through a fixed sequence of stages with no retries. The
//! first failing stage decides the status code returned to the event source.

use super::event::{EventError, StorageObjectEvent};
use crate::auth::{AuthError, TokenProvider};
use crate::config::RelayConfig;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};
use url::Url;

pub const OK_BODY: &str = "OK";

/// Stages of a single relay invocation, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    ValidateConfig,
    ValidatePayload,
    AcquireToken,
    NotifySession,
    SubmitMessage,
    Done,
}

impl RelayStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayStage::ValidateConfig => "validate_config",
            RelayStage::ValidatePayload => "validate_payload",
            RelayStage::AcquireToken => "acquire_token",
            RelayStage::NotifySession => "notify_session",
            RelayStage::SubmitMessage => "submit_message",
            RelayStage::Done => "done",
        }
    }
}

impl fmt::Display for RelayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("TARGET_APP_URL is not set")]
    MissingTargetUrl,
    #[error("TARGET_APP_URL is not a usable base URL: {0}")]
    InvalidTargetUrl(String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error(transparent)]
    InvalidPayload(#[from] EventError),
    #[error("Failed to fetch identity token: {0}")]
    Auth(#[from] AuthError),
    #[error("Session update rejected with {status}: {body}")]
    SessionRejected { status: StatusCode, body: String },
    #[error("Session call failed: {0}")]
    SessionTransport(String),
    #[error("Run SSE rejected with {status}: {body}")]
    RunRejected { status: StatusCode, body: String },
    #[error("Run SSE call failed: {0}")]
    RunTransport(String),
}

impl RelayError {
    pub fn stage(&self) -> RelayStage {
        match self {
            RelayError::MissingTargetUrl
            | RelayError::InvalidTargetUrl(_)
            | RelayError::HttpClient(_) => RelayStage::ValidateConfig,
            RelayError::InvalidPayload(_) => RelayStage::ValidatePayload,
            RelayError::Auth(_) => RelayStage::AcquireToken,
            RelayError::SessionRejected { .. } | RelayError::SessionTransport(_) => {
                RelayStage::NotifySession
            }
            RelayError::RunRejected { .. } | RelayError::RunTransport(_) => {
                RelayStage::SubmitMessage
            }
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::InvalidPayload(_) => 400,
            RelayError::SessionRejected { .. } | RelayError::RunRejected { .. } => 502,
            RelayError::MissingTargetUrl
            | RelayError::InvalidTargetUrl(_)
            | RelayError::HttpClient(_)
            | RelayError::Auth(_)
            | RelayError::SessionTransport(_)
            | RelayError::RunTransport(_) => 500,
        }
    }

    /// Response body returned to the event source
    pub fn body(&self) -> String {
        match self {
            RelayError::MissingTargetUrl
            | RelayError::InvalidTargetUrl(_)
            | RelayError::HttpClient(_) => "Server configuration error".to_string(),
            RelayError::InvalidPayload(_) => "Bad request: Invalid event payload".to_string(),
            RelayError::Auth(_) => "Internal authentication error".to_string(),
            RelayError::SessionRejected { body, .. } => format!("Failed to update session: {body}"),
            RelayError::SessionTransport(_) => "Session call failed".to_string(),
            RelayError::RunRejected { body, .. } => format!("Failed to run SSE: {body}"),
            RelayError::RunTransport(_) => "Run SSE call failed".to_string(),
        }
    }
}

/// Status and body handed back to the event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub status: u16,
    pub body: String,
}

impl RelayOutcome {
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: OK_BODY.to_string(),
        }
    }
}

impl From<RelayError> for RelayOutcome {
    fn from(err: RelayError) -> Self {
        Self {
            status: err.status_code(),
            body: err.body(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagePart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct NewMessage<'a> {
    role: &'static str,
    parts: Vec<MessagePart<'a>>,
}

/// Body of the message-submission call
#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    app_name: &'a str,
    user_id: &'a str,
    session_id: &'a str,
    new_message: NewMessage<'a>,
    streaming: bool,
}

/// Initial state sent when creating the session
pub fn session_state_body() -> Value {
    json!({
        "state": {
            "preferred_language": "English",
            "visit_count": 5
        }
    })
}

pub struct EventRelay {
    config: RelayConfig,
    tokens: Arc<dyn TokenProvider>,
    client: Client,
}

impl EventRelay {
    pub fn new(config: RelayConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RelayError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            tokens,
            client,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relay one event and map the result to a status and body
    pub async fn handle(&self, payload: &Value) -> RelayOutcome {
        let span = crate::relay_span!(app = %self.config.app_name);

        async {
            match self.relay(payload).await {
                Ok(()) => {
                    debug!(stage = %RelayStage::Done, "Relay finished");
                    RelayOutcome::ok()
                }
                Err(err) => {
                    match err.status_code() {
                        400 => warn!(stage = %err.stage(), error = %err, "Rejected event"),
                        _ => error!(stage = %err.stage(), error = %err, "Relay failed"),
                    }
                    RelayOutcome::from(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn relay(&self, payload: &Value) -> Result<(), RelayError> {
        let base = self
            .config
            .target_url
            .as_deref()
            .ok_or(RelayError::MissingTargetUrl)?;
        let base_url = parse_base(base)?;

        let event = StorageObjectEvent::from_payload(payload).map_err(|e| {
            debug!(payload = %payload, "Received data");
            e
        })?;
        let document_uri = event.document_uri();
        let session_id = event.name.as_str();
        info!(document = %document_uri, "Received trigger for file");

        let token = self.tokens.identity_token(base).await?;

        let session_url = self.session_url(&base_url, session_id)?;
        debug!(url = %session_url, "Calling session update endpoint");
        let response = self
            .client
            .post(session_url)
            .bearer_auth(&token)
            .json(&session_state_body())
            .send()
            .await
            .map_err(|e| RelayError::SessionTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::SessionRejected { status, body });
        }
        debug!(status = status.as_u16(), "Session updated");

        let run_url = join_segments(&base_url, &["run_sse"])?;
        let request = RunRequest {
            app_name: &self.config.app_name,
            user_id: &self.config.user_id,
            session_id,
            new_message: NewMessage {
                role: "user",
                parts: vec![MessagePart {
                    text: &document_uri,
                }],
            },
            streaming: false,
        };

        debug!(url = %run_url, "Calling run_sse endpoint");
        let response = self
            .client
            .post(run_url)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::RunTransport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RelayError::RunRejected { status, body });
        }

        info!(
            document = %document_uri,
            response_bytes = body.len(),
            "Successfully processed file"
        );
        Ok(())
    }

    fn session_url(&self, base: &Url, session_id: &str) -> Result<Url, RelayError> {
        join_segments(
            base,
            &[
                "apps",
                &self.config.app_name,
                "users",
                &self.config.user_id,
                "sessions",
                session_id,
            ],
        )
    }
}

fn parse_base(base: &str) -> Result<Url, RelayError> {
    let url = Url::parse(base).map_err(|e| RelayError::InvalidTargetUrl(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(RelayError::InvalidTargetUrl(format!(
            "'{base}' cannot be a base URL"
        )));
    }
    Ok(url)
}

/// Append percent-encoded path segments to a base URL
fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, RelayError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RelayError::InvalidTargetUrl(format!("'{base}' cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
