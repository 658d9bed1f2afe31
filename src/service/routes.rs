//! Agent service HTTP routes
//!
//! Hosts the two endpoints the relay calls (session upsert and message
//! submission) plus health checks. A submitted message runs the hold pipeline
//! for the `gs://` URI it carries and streams back one event per step.

use super::sessions::SessionStore;
use crate::error::AgentError;
use crate::llm::provider::LlmProvider;
use crate::pipeline::{HoldPipeline, StepReport};
use crate::storage::ObjectLocation;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Shared state behind every route
pub struct AgentService {
    app_name: String,
    sessions: SessionStore,
    pipeline: HoldPipeline,
    llm: Arc<dyn LlmProvider>,
}

impl AgentService {
    pub fn new(
        app_name: impl Into<String>,
        pipeline: HoldPipeline,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            sessions: SessionStore::new(),
            pipeline,
            llm,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn check_app(&self, app_name: &str) -> Result<(), AgentError> {
        if app_name == self.app_name {
            Ok(())
        } else {
            Err(AgentError::not_found(format!("App not found: {app_name}")))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SessionRequest {
    #[serde(default)]
    state: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    #[serde(default)]
    pub streaming: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub role: Option<String>,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl NewMessage {
    /// Text of all parts, concatenated and trimmed
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody<'a> {
    status: &'static str,
    app_name: &'a str,
    provider: &'a str,
    sessions: usize,
    error: Option<String>,
    timestamp: i64,
}

/// All agent service routes
pub fn routes(
    service: Arc<AgentService>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let sessions = warp::path!("apps" / String / "users" / String / "sessions" / String)
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_service(service.clone()))
        .and_then(upsert_session);

    let run = warp::path!("run_sse")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_service(service.clone()))
        .and_then(run_sse);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_service(service))
        .and_then(health_status);

    let live = warp::path!("live").and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "alive": true,
            "timestamp": chrono::Utc::now().timestamp(),
        }))
        .into_response()
    });

    sessions.or(run).unify().or(health).unify().or(live).unify()
}

fn with_service(
    service: Arc<AgentService>,
) -> impl Filter<Extract = (Arc<AgentService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn decode_segment(segment: &str) -> Result<String, AgentError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| AgentError::invalid_input(format!("Path segment is not UTF-8: {segment}")))
}

fn error_reply(err: &AgentError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }

    warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            error: err.public_message(),
        }),
        status,
    )
    .into_response()
}

async fn upsert_session(
    app: String,
    user: String,
    session: String,
    body: Bytes,
    service: Arc<AgentService>,
) -> Result<Response, Infallible> {
    Ok(handle_upsert(&app, &user, &session, &body, &service)
        .await
        .unwrap_or_else(|err| error_reply(&err)))
}

async fn handle_upsert(
    app: &str,
    user: &str,
    session: &str,
    body: &[u8],
    service: &AgentService,
) -> Result<Response, AgentError> {
    let app = decode_segment(app)?;
    let user = decode_segment(user)?;
    let session_id = decode_segment(session)?;
    service.check_app(&app)?;

    let request: SessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SessionRequest::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AgentError::invalid_input(format!("Invalid session body: {e}")))?
    };

    let session = service
        .sessions
        .upsert(&app, &user, &session_id, request.state)
        .await;
    info!(user = %user, session = %session_id, "Session updated");

    Ok(warp::reply::json(&session).into_response())
}

async fn run_sse(body: Bytes, service: Arc<AgentService>) -> Result<Response, Infallible> {
    Ok(handle_run(&body, &service)
        .await
        .unwrap_or_else(|err| error_reply(&err)))
}

async fn handle_run(body: &[u8], service: &AgentService) -> Result<Response, AgentError> {
    let request: RunRequest = serde_json::from_slice(body)
        .map_err(|e| AgentError::invalid_input(format!("Invalid run request: {e}")))?;
    service.check_app(&request.app_name)?;

    service
        .sessions
        .get(&request.app_name, &request.user_id, &request.session_id)
        .await
        .ok_or_else(|| {
            AgentError::not_found(format!("Session not found: {}", request.session_id))
        })?;

    let text = request.new_message.text();
    let document = ObjectLocation::parse(&text).map_err(|e| {
        AgentError::invalid_input(format!("Message must be a gs:// document URI: {e}"))
    })?;

    let run = service.pipeline.run(document).await?;
    info!(
        session = %request.session_id,
        run_id = %run.run_id,
        hold_recorded = run.hold_recorded,
        "Pipeline run complete"
    );

    let body = event_stream(&run.reports)?;
    service
        .sessions
        .merge_state(
            &request.app_name,
            &request.user_id,
            &request.session_id,
            run.state.into_values(),
        )
        .await;

    Ok(warp::reply::with_header(body, "content-type", EVENT_STREAM_CONTENT_TYPE).into_response())
}

/// One `data:` event per step report
pub fn event_stream(reports: &[StepReport]) -> Result<String, AgentError> {
    let mut body = String::new();
    for report in reports {
        let data = serde_json::to_string(report)
            .map_err(|e| AgentError::internal_error(format!("Failed to encode report: {e}")))?;
        body.push_str("data: ");
        body.push_str(&data);
        body.push_str("\n\n");
    }
    Ok(body)
}

async fn health_status(service: Arc<AgentService>) -> Result<Response, Infallible> {
    let check = service.llm.health_check().await;
    let body = HealthBody {
        status: if check.is_ok() { "healthy" } else { "degraded" },
        app_name: &service.app_name,
        provider: service.llm.name(),
        sessions: service.sessions.len().await,
        error: check.as_ref().err().map(|e| e.to_string()),
        timestamp: chrono::Utc::now().timestamp(),
    };
    let status = if check.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
}

/// Serve the agent until the process is stopped
pub async fn serve(service: Arc<AgentService>, port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, app = %service.app_name(), "Starting agent service");
    warp::serve(routes(service)).run(addr).await;
}
