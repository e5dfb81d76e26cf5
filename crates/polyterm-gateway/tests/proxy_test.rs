//! Order and claim proxy routes against a local collaborator.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use polyterm_dispatch::DispatchConfig;
use polyterm_gateway::{create_router, AppState, CollaboratorProxy, GatewayConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

#[derive(Clone)]
struct Collaborator {
    calls: Arc<AtomicUsize>,
    cold_calls: usize,
}

async fn place_order(
    State(state): State<Collaborator>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let call = state.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if call <= state.cold_calls {
        return (
            StatusCode::BAD_GATEWAY,
            [(header::CONTENT_TYPE, "text/html")],
            "<html>function starting</html>",
        )
            .into_response();
    }
    if headers.get(header::AUTHORIZATION).map(|v| v.as_bytes()) != Some(b"Bearer tok".as_slice()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response();
    }
    if body["amount"] == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "amount must be positive"})),
        )
            .into_response();
    }
    Json(serde_json::json!({"success": true, "order_id": "ord-1"})).into_response()
}

async fn claim() -> Response {
    Json(serde_json::json!({"claimed": true})).into_response()
}

async fn start_collaborator(cold_calls: usize) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/api/place-order", post(place_order))
        .route("/api/claim", post(claim))
        .with_state(Collaborator {
            calls: calls.clone(),
            cold_calls,
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), calls)
}

fn gateway(base_url: String, token: Option<&str>) -> Router {
    let config = DispatchConfig {
        base_url,
        max_attempts: 3,
        retry_delay_ms: 10,
        timeout_ms: 2000,
        token: token.map(str::to_string),
        ..Default::default()
    };
    let proxy = tokio_test::assert_ok!(CollaboratorProxy::new(config));
    create_router(AppState::new(GatewayConfig::default(), None, proxy))
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_order_recovers_after_cold_start() {
    let (base_url, calls) = start_collaborator(2).await;
    let app = gateway(base_url, Some("tok"));

    let (status, body) = call(app, post_json("/api/orders", serde_json::json!({"amount": 5}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], "ord-1");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_collaborator_status_passes_through() {
    let (base_url, _calls) = start_collaborator(0).await;
    let app = gateway(base_url, Some("tok"));

    let (status, body) = call(app, post_json("/api/orders", serde_json::json!({"amount": 0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "amount must be positive");
}

#[tokio::test]
async fn test_non_json_after_max_attempts_is_bad_gateway() {
    let (base_url, calls) = start_collaborator(usize::MAX).await;
    let app = gateway(base_url, Some("tok"));

    let (status, body) = call(app, post_json("/api/orders", serde_json::json!({"amount": 5}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("non-JSON response after 3 attempts"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transport_failure_is_bad_gateway() {
    let app = gateway("http://127.0.0.1:1".to_string(), Some("tok"));

    let (status, body) = call(app, post_json("/api/claim", serde_json::json!({}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Collaborator request failed"));
}

#[tokio::test]
async fn test_claim_route() {
    let (base_url, _calls) = start_collaborator(0).await;
    let app = gateway(base_url, Some("tok"));

    let (status, body) = call(app, post_json("/api/claim", serde_json::json!({"market": "m"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claimed"], true);
}

#[tokio::test]
async fn test_missing_dispatch_token() {
    let (base_url, calls) = start_collaborator(0).await;
    let app = gateway(base_url, None);

    let (status, body) = call(app, post_json("/api/orders", serde_json::json!({}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Dispatch token not configured"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_body_is_json_bad_request() {
    let (base_url, calls) = start_collaborator(0).await;

    for uri in ["/api/orders", "/api/claim"] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"amount\": "))
            .unwrap();
        let (status, body) = call(gateway(base_url.clone(), Some("tok")), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].as_str().unwrap().starts_with("Invalid input"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
