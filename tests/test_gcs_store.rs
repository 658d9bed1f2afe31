//! Integration tests for the Cloud Storage object store and hold ledger
//!
//! A wiremock server stands in for the JSON API.

use coa_agent::auth::StaticTokenProvider;
use coa_agent::ledger::HoldLedger;
use coa_agent::storage::{GcsConfig, GcsObjectStore, ObjectLocation, ObjectStore, StorageError};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(base_url: &str) -> Arc<GcsObjectStore> {
    let config = GcsConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    };
    let tokens = Arc::new(StaticTokenProvider::new("gcs-token"));
    Arc::new(GcsObjectStore::new(config, tokens).unwrap())
}

fn ledger_location() -> ObjectLocation {
    ObjectLocation::new("coa-docs", "product_holds.txt")
}

#[tokio::test]
async fn test_read_text_downloads_media() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/coa-docs/o/product%5Fholds%2Etxt"))
        .and(query_param("alt", "media"))
        .and(header("Authorization", "Bearer gcs-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Product #A-1 status: Hold"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let text = store(&mock_server.uri())
        .read_text(&ledger_location())
        .await
        .unwrap();

    assert_eq!(text, "Product #A-1 status: Hold");
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("No such object"))
        .mount(&mock_server)
        .await;

    let result = store(&mock_server.uri()).read_text(&ledger_location()).await;

    assert!(matches!(
        result,
        Err(StorageError::NotFound(uri)) if uri == "gs://coa-docs/product_holds.txt"
    ));
}

#[tokio::test]
async fn test_write_text_uploads_media() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/coa-docs/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "product_holds.txt"))
        .and(header("Content-Type", "text/plain"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    store(&mock_server.uri())
        .write_text(&ledger_location(), "hello", "text/plain")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_forbidden_is_authentication_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&mock_server)
        .await;

    let result = store(&mock_server.uri())
        .write_text(&ledger_location(), "x", "text/plain")
        .await;

    assert!(matches!(result, Err(StorageError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_ledger_append_rewrites_whole_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/coa-docs/o/product%5Fholds%2Etxt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Product #A-1 status: Hold"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/coa-docs/o"))
        .and(body_string(
            "Product #A-1 status: Hold\nProduct #B-2 status: Hold",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let ledger = HoldLedger::new(store(&mock_server.uri()), ledger_location());
    let record = ledger.append("B-2").await.unwrap();

    assert_eq!(record, "Product #B-2 status: Hold");
}

#[tokio::test]
async fn test_rooted_ledger_name_is_kept_on_the_wire() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/coa-docs/o/%2Fproduct%5Fholds%2Etxt"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Product #OLD status: Hold"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/coa-docs/o"))
        .and(query_param("name", "/product_holds.txt"))
        .and(body_string("Product #OLD status: Hold\nProduct #B-2 status: Hold"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let ledger = HoldLedger::new(
        store(&mock_server.uri()),
        ObjectLocation::new("coa-docs", "/product_holds.txt"),
    );

    ledger.append("B-2").await.unwrap();
}

#[tokio::test]
async fn test_ledger_read_failure_skips_write() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let ledger = HoldLedger::new(store(&mock_server.uri()), ledger_location());
    let result = ledger.append("B-2").await;

    assert!(matches!(result, Err(StorageError::ApiError(_))));
}
