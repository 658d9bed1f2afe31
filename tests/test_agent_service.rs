//! Agent service HTTP tests
//!
//! Exercise the routes the relay calls with warp's test client, backed by a
//! scripted model and an in-memory bucket.

mod test_helpers;

use coa_agent::service::{routes, AgentService, EVENT_STREAM_CONTENT_TYPE};
use coa_agent::testing::{MemoryObjectStore, MockLlmProvider};
use coa_agent::HoldPipeline;
use serde_json::{json, Value};
use std::sync::Arc;
use test_helpers::*;

const APP: &str = "test_agents";
const SESSION_PATH: &str = "/apps/test_agents/users/Cloud%20Run%20Service/sessions/lot-7.pdf";

fn service_with(llm: Arc<MockLlmProvider>, store: Arc<MemoryObjectStore>) -> Arc<AgentService> {
    let pipeline = HoldPipeline::new(llm.clone(), store, test_settings());
    Arc::new(AgentService::new(APP, pipeline, llm))
}

fn scripted_service(responses: &[&str]) -> (Arc<AgentService>, Arc<MemoryObjectStore>) {
    let (_pipeline, llm, store) = scripted_pipeline(responses, "");
    (service_with(llm, store.clone()), store)
}

fn run_body(session_id: &str, text: &str) -> Value {
    json!({
        "app_name": APP,
        "user_id": "Cloud Run Service",
        "session_id": session_id,
        "new_message": {"role": "user", "parts": [{"text": text}]},
        "streaming": false
    })
}

fn data_events(body: &[u8]) -> Vec<Value> {
    std::str::from_utf8(body)
        .unwrap()
        .split("\n\n")
        .filter(|event| !event.is_empty())
        .map(|event| serde_json::from_str(event.strip_prefix("data: ").unwrap()).unwrap())
        .collect()
}

async fn create_session(service: &Arc<AgentService>) {
    let response = warp::test::request()
        .method("POST")
        .path(SESSION_PATH)
        .json(&json!({"state": {"preferred_language": "English", "visit_count": 5}}))
        .reply(&routes(service.clone()))
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_session_upsert_decodes_path_segments() {
    let (service, _store) = scripted_service(&[]);

    let response = warp::test::request()
        .method("POST")
        .path(SESSION_PATH)
        .json(&json!({"state": {"visit_count": 5}}))
        .reply(&routes(service.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let session: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(session["id"], "lot-7.pdf");
    assert_eq!(session["user_id"], "Cloud Run Service");
    assert_eq!(session["state"]["visit_count"], 5);

    let stored = service
        .sessions()
        .get(APP, "Cloud Run Service", "lot-7.pdf")
        .await;
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_session_upsert_accepts_empty_body() {
    let (service, _store) = scripted_service(&[]);

    let response = warp::test::request()
        .method("POST")
        .path("/apps/test_agents/users/u/sessions/s")
        .reply(&routes(service.clone()))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(service.sessions().len().await, 1);
}

#[tokio::test]
async fn test_unknown_app_is_not_found() {
    let (service, _store) = scripted_service(&[]);

    let response = warp::test::request()
        .method("POST")
        .path("/apps/other_app/users/u/sessions/s")
        .json(&json!({"state": {}}))
        .reply(&routes(service.clone()))
        .await;

    assert_eq!(response.status(), 404);
    assert!(service.sessions().is_empty().await);
}

#[tokio::test]
async fn test_run_streams_step_events_and_merges_state() {
    let (service, store) = scripted_service(&["A-100", "Moisture out of range.", "True"]);
    create_session(&service).await;

    let response = warp::test::request()
        .method("POST")
        .path("/run_sse")
        .json(&run_body("lot-7.pdf", DOCUMENT_URI))
        .reply(&routes(service.clone()))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        EVENT_STREAM_CONTENT_TYPE
    );

    let events = data_events(response.body());
    let stages: Vec<&str> = events
        .iter()
        .map(|e| e["stage"].as_str().unwrap())
        .collect();
    assert_eq!(
        stages,
        vec!["extract_product", "compare_documents", "decide_hold", "record_hold"]
    );
    assert!(events.iter().all(|e| e["status"] == "success"));

    let session = service
        .sessions()
        .get(APP, "Cloud Run Service", "lot-7.pdf")
        .await
        .unwrap();
    assert_eq!(session.state["product"], "A-100");
    assert_eq!(session.state["product_hold"], "true");
    assert_eq!(session.state["preferred_language"], "English");

    assert_eq!(
        store.get(&ledger_location()).unwrap(),
        "\nProduct #A-100 status: Hold"
    );
}

#[tokio::test]
async fn test_run_reports_skipped_recorder() {
    let (service, store) = scripted_service(&["A-100", "All good.", "false"]);
    create_session(&service).await;

    let response = warp::test::request()
        .method("POST")
        .path("/run_sse")
        .json(&run_body("lot-7.pdf", DOCUMENT_URI))
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), 200);
    let events = data_events(response.body());
    assert_eq!(events.len(), 4);
    assert_eq!(events[3]["stage"], "record_hold");
    assert_eq!(events[3]["status"], "skipped");
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_run_without_session_is_not_found() {
    let (service, _store) = scripted_service(&["A-100"]);

    let response = warp::test::request()
        .method("POST")
        .path("/run_sse")
        .json(&run_body("missing.pdf", DOCUMENT_URI))
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), 404);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing.pdf"));
}

#[tokio::test]
async fn test_run_rejects_message_without_document_uri() {
    let (service, _store) = scripted_service(&["A-100"]);
    create_session(&service).await;

    let response = warp::test::request()
        .method("POST")
        .path("/run_sse")
        .json(&run_body("lot-7.pdf", "please check lot 7"))
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_run_rejects_malformed_body() {
    let (service, _store) = scripted_service(&[]);

    let response = warp::test::request()
        .method("POST")
        .path("/run_sse")
        .body("not json")
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_pipeline_failure_is_server_error() {
    let llm = Arc::new(MockLlmProvider::new(vec!["A-100".into()]).failing_on_call(1));
    let store = Arc::new(MemoryObjectStore::new());
    let service = service_with(llm, store.clone());
    create_session(&service).await;

    let response = warp::test::request()
        .method("POST")
        .path("/run_sse")
        .json(&run_body("lot-7.pdf", DOCUMENT_URI))
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), 500);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("compare_documents"));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_health_reflects_model_readiness() {
    let (service, _store) = scripted_service(&[]);
    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["provider"], "mock");

    let failing = service_with(
        Arc::new(MockLlmProvider::with_failure()),
        Arc::new(MemoryObjectStore::new()),
    );
    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes(failing))
        .await;

    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_liveness_reports_alive() {
    let (service, _store) = scripted_service(&[]);
    let response = warp::test::request()
        .method("GET")
        .path("/live")
        .reply(&routes(service))
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["alive"], true);
}
