use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use rendezvous_backend::{app, AppState};
use rendezvous_common::models::User;
use rendezvous_common::{NoopGeocoder, RecordingPushGateway};
use rendezvous_config::AppConfig;
use rendezvous_db::MemoryDocumentStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn injected_services_back_the_api() {
    let push = Arc::new(RecordingPushGateway::new());
    let store = Arc::new(MemoryDocumentStore::with_users([
        User::new("alice").with_token("tok-a"),
        User::new("bob").with_token("tok-b"),
    ]));
    let state = AppState::builder(Arc::new(AppConfig::default()))
        .with_store(store)
        .with_push_gateway(push.clone())
        .with_geocoder(Arc::new(NoopGeocoder))
        .build()
        .await
        .unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/sendMatchNotification")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"data": {"userId1": "alice", "userId2": "bob"}}).to_string(),
        ))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let titles: Vec<String> = push.sent().into_iter().map(|m| m.title).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.iter().all(|t| t == &titles[0]));
}

#[tokio::test]
async fn welcome_route_answers() {
    let state = AppState::builder(Arc::new(AppConfig::default()))
        .build()
        .await
        .unwrap();

    let response = app(&state)
        .oneshot(Request::get("/api/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
