//! HTTP integration tests driving the router directly with tower.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use dealwatch_api::app::{build_router, AppState};
use dealwatch_shared::fetch::{FetchError, PriceFetcher, PriceQuote};
use dealwatch_shared::store::{MemStore, Store};

struct ScriptedFetcher(HashMap<&'static str, f64>);

#[async_trait]
impl PriceFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<PriceQuote, FetchError> {
        self.0
            .get(url)
            .map(|price| PriceQuote { price: *price })
            .ok_or_else(|| FetchError::Permanent(format!("no such product: {url}")))
    }
}

fn test_app() -> (axum::Router, Arc<MemStore>) {
    let store = Arc::new(MemStore::new());
    let as_store: Arc<dyn Store> = store.clone();
    let fetcher = Arc::new(ScriptedFetcher(
        [
            ("https://shop.example/milk", 4.0),
            ("https://shop.example/bread", 3.0),
        ]
        .into(),
    ));
    let state = AppState::new(as_store, fetcher);
    (build_router(state), store)
}

async fn post_inbound(app: &axum::Router, sender: &str, text: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/inbound")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "sender": sender, "text": text }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn reply(body: &Value) -> &str {
    body["reply"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn health_check_works() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn inbound_command_round_trip() {
    let (app, _) = test_app();

    let (status, body) = post_inbound(&app, "tg:alice", "ROOMCREATE Smith Family").await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply(&body).contains("Created 'Smith Family'"), "got: {body}");

    let (status, body) =
        post_inbound(&app, "tg:alice", "ADD https://shop.example/milk | Milk | 2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply(&body).contains("Watching Milk x2"), "got: {body}");

    // Errors are replies, not HTTP failures.
    let (status, body) = post_inbound(&app, "tg:alice", "SUMARY").await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply(&body).contains("Did you mean ORDERSUMMARY?"), "got: {body}");
}

#[tokio::test]
async fn inbound_rejects_empty_sender() {
    let (app, _) = test_app();
    let (status, body) = post_inbound(&app, "  ", "ROOMS").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn room_summary_endpoint() {
    let (app, store) = test_app();

    post_inbound(&app, "tg:alice", "ROOMCREATE Smiths").await;
    post_inbound(&app, "tg:alice", "NAME Alice").await;
    post_inbound(&app, "tg:alice", "ADD https://shop.example/bread | Bread").await;

    let user = store
        .find_user_by_channel("tg:alice")
        .await
        .unwrap()
        .unwrap();
    let room_id = user.active_room_id.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/rooms/{room_id}/summary"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("Alice: Bread x1 ($3)"), "got:\n{text}");
    assert!(text.ends_with("Total: $3"), "got:\n{text}");
}

#[tokio::test]
async fn summary_for_unknown_room_is_404() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/rooms/{}/summary", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
