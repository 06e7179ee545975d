use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Map, json};

use super::*;
use crate::provider::config::ProviderTimeouts;

// =============================================================================
// parse_edit_response
// =============================================================================

#[test]
fn parse_images_array_of_objects() {
    let text = json!({
        "images": [{ "url": "https://cdn.fal/edited.png", "width": 1024, "height": 768 }],
        "seed": 42,
        "request_id": "req-1"
    })
    .to_string();
    let out = parse_edit_response(&text).unwrap();
    assert_eq!(out.image_url, "https://cdn.fal/edited.png");
    assert_eq!(out.request_id.as_deref(), Some("req-1"));
}

#[test]
fn parse_images_array_of_strings() {
    let text = json!({ "images": ["https://cdn.fal/a.png"] }).to_string();
    assert_eq!(parse_edit_response(&text).unwrap().image_url, "https://cdn.fal/a.png");
}

#[test]
fn parse_single_image_object() {
    let text = json!({ "image": { "url": "https://cdn.fal/b.png" } }).to_string();
    assert_eq!(parse_edit_response(&text).unwrap().image_url, "https://cdn.fal/b.png");
}

#[test]
fn parse_success_without_image_is_missing_image() {
    let text = json!({ "images": [], "seed": 1 }).to_string();
    assert!(matches!(parse_edit_response(&text), Err(ProviderError::MissingImage)));
}

#[test]
fn parse_blank_url_is_missing_image() {
    let text = json!({ "images": [{ "url": "  " }] }).to_string();
    assert!(matches!(parse_edit_response(&text), Err(ProviderError::MissingImage)));
}

#[test]
fn parse_non_json_is_parse_error() {
    assert!(matches!(parse_edit_response("<html>bad gateway</html>"), Err(ProviderError::Parse(_))));
}

#[test]
fn truncate_caps_long_bodies() {
    let long = "x".repeat(600);
    let cut = truncate(&long, MAX_ERROR_BODY_CHARS);
    assert_eq!(cut.chars().count(), MAX_ERROR_BODY_CHARS + 1);
    assert_eq!(truncate("short", MAX_ERROR_BODY_CHARS), "short");
}

#[test]
fn edit_request_debug_redacts_credential() {
    let req = EditRequest { endpoint: "fal-ai/x".into(), credential: "super-secret".into(), input: Map::new() };
    let rendered = format!("{req:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("<redacted>"));
}

// =============================================================================
// FalClient against an in-process stub
// =============================================================================

#[derive(Clone, Default)]
struct Seen {
    auth: Arc<Mutex<Option<String>>>,
    body: Arc<Mutex<Option<Value>>>,
}

async fn stub_ok(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    *seen.auth.lock().unwrap() = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *seen.body.lock().unwrap() = Some(body);
    Json(json!({ "images": [{ "url": "https://cdn.fal/out.png" }], "request_id": "abc" }))
}

async fn stub_fail() -> (StatusCode, &'static str) {
    (StatusCode::UNPROCESSABLE_ENTITY, "{\"detail\":\"bad image\"}")
}

async fn spawn_stub(seen: Seen) -> String {
    let app = Router::new()
        .route("/fal-ai/ok", post(stub_ok))
        .route("/fal-ai/fail", post(stub_fail))
        .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_for(base: &str) -> FalClient {
    FalClient::new(&ProviderConfig { api_base: base.to_string(), timeouts: ProviderTimeouts::default() }).unwrap()
}

#[tokio::test]
async fn edit_posts_input_with_key_auth() {
    let seen = Seen::default();
    let base = spawn_stub(seen.clone()).await;
    let client = client_for(&base);

    let mut input = Map::new();
    input.insert("prompt".into(), json!("make sky blue"));
    input.insert("image_url".into(), json!("https://x/img.png"));
    let request = EditRequest { endpoint: "fal-ai/ok".into(), credential: "test-key".into(), input };

    let out = client.edit(&request).await.unwrap();
    assert_eq!(out.image_url, "https://cdn.fal/out.png");
    assert_eq!(out.request_id.as_deref(), Some("abc"));
    assert_eq!(seen.auth.lock().unwrap().as_deref(), Some("Key test-key"));
    let body = seen.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["prompt"], "make sky blue");
    assert_eq!(body["image_url"], "https://x/img.png");
}

#[tokio::test]
async fn edit_maps_error_status() {
    let base = spawn_stub(Seen::default()).await;
    let client = client_for(&base);
    let request = EditRequest { endpoint: "/fal-ai/fail".into(), credential: "k".into(), input: Map::new() };

    match client.edit(&request).await {
        Err(ProviderError::Status { status, body }) => {
            assert_eq!(status, 422);
            assert!(body.contains("bad image"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn edit_unreachable_host_is_request_error() {
    let client = client_for("http://127.0.0.1:1");
    let request = EditRequest { endpoint: "fal-ai/ok".into(), credential: "k".into(), input: Map::new() };
    assert!(matches!(client.edit(&request).await, Err(ProviderError::Request(_))));
}

#[test]
fn absolute_endpoint_bypasses_api_base() {
    let client = client_for("https://fal.run");
    assert_eq!(client.endpoint_url("https://queue.fal.run/x"), "https://queue.fal.run/x");
    assert_eq!(client.endpoint_url("fal-ai/x"), "https://fal.run/fal-ai/x");
}
