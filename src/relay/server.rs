//! HTTP front for the event relay
//!
//! Eventarc delivers storage notifications as `POST /` with the object
//! metadata as the body (binary mode) or wrapped in a CloudEvent envelope
//! (structured mode). The relay's status and body are returned verbatim.

use super::handler::EventRelay;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Routes served by the relay
pub fn routes(
    relay: Arc<EventRelay>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let events = warp::path::end()
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_relay(relay))
        .and_then(handle_event);

    let live = warp::path("live").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "alive": true,
            "timestamp": chrono::Utc::now().timestamp(),
        }))
    });

    events.or(live)
}

fn with_relay(
    relay: Arc<EventRelay>,
) -> impl Filter<Extract = (Arc<EventRelay>,), Error = Infallible> + Clone {
    warp::any().map(move || relay.clone())
}

async fn handle_event(
    body: warp::hyper::body::Bytes,
    relay: Arc<EventRelay>,
) -> Result<impl Reply, Infallible> {
    // A non-JSON body fails payload validation, after the config check
    let payload = serde_json::from_slice(&body).unwrap_or_else(|e| {
        warn!(error = %e, "Event body is not JSON");
        Value::Null
    });

    let outcome = relay.handle(&payload).await;
    let status =
        StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok(warp::reply::with_status(outcome.body, status))
}

/// Serve the relay until the process is stopped
pub async fn serve(relay: Arc<EventRelay>, port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, "Starting event relay");
    warp::serve(routes(relay)).run(addr).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::testing::MockTokenProvider;

    fn relay(config: RelayConfig) -> (Arc<EventRelay>, Arc<MockTokenProvider>) {
        let tokens = Arc::new(MockTokenProvider::new("id-token"));
        let relay = EventRelay::new(config, tokens.clone()).unwrap();
        (Arc::new(relay), tokens)
    }

    #[tokio::test]
    async fn test_missing_target_url_is_configuration_error() {
        let (relay, tokens) = relay(RelayConfig::default());

        let response = warp::test::request()
            .method("POST")
            .path("/")
            .json(&serde_json::json!({"bucket": "b", "name": "f.pdf"}))
            .reply(&routes(relay))
            .await;

        assert_eq!(response.status(), 500);
        assert_eq!(response.body(), "Server configuration error");
        assert_eq!(tokens.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_json_body_is_bad_request() {
        let (relay, tokens) = relay(RelayConfig::test_config("http://127.0.0.1:1"));

        let response = warp::test::request()
            .method("POST")
            .path("/")
            .body("not json")
            .reply(&routes(relay))
            .await;

        assert_eq!(response.status(), 400);
        assert_eq!(response.body(), "Bad request: Invalid event payload");
        assert_eq!(tokens.call_count(), 0);
    }

    #[tokio::test]
    async fn test_config_error_wins_over_bad_body() {
        let (relay, _tokens) = relay(RelayConfig::default());

        let response = warp::test::request()
            .method("POST")
            .path("/")
            .body("not json")
            .reply(&routes(relay))
            .await;

        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_live() {
        let (relay, _tokens) = relay(RelayConfig::default());

        let response = warp::test::request()
            .method("GET")
            .path("/live")
            .reply(&routes(relay))
            .await;

        assert_eq!(response.status(), 200);
    }
}
