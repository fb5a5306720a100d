use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rendezvous_common::models::{NotificationRecord, NotificationType, User};
use rendezvous_common::{NoopGeocoder, RecordingPushGateway};
use rendezvous_config::AppConfig;
use rendezvous_db::{DocumentStore, MemoryDocumentStore};
use rendezvous_matching::{routes, MatchingState, REQUEST_TIMEOUT_HEADER};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    app: Router,
    store: Arc<MemoryDocumentStore>,
    push: Arc<RecordingPushGateway>,
}

fn harness(users: Vec<User>) -> Harness {
    let mut config = AppConfig::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config.retry.jitter = false;
    harness_with_config(users, config)
}

fn harness_with_config(users: Vec<User>, config: AppConfig) -> Harness {
    let store = Arc::new(MemoryDocumentStore::with_users(users));
    let push = Arc::new(RecordingPushGateway::new());
    let state = MatchingState::new(
        &config,
        store.clone(),
        push.clone(),
        Arc::new(NoopGeocoder),
    );

    Harness {
        app: routes(Arc::new(state)),
        store,
        push,
    }
}

fn call(path: &str, data: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(json!({ "data": data }).to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, body)
}

fn stale_notification(user_id: &str, days_old: i64) -> NotificationRecord {
    NotificationRecord {
        id: format!("n-{}-{}", user_id, days_old),
        user_id: user_id.to_string(),
        title: "Old".to_string(),
        body: "Old news".to_string(),
        kind: NotificationType::General,
        related_id: String::new(),
        created_at: Utc::now() - Duration::days(days_old),
        is_read: false,
    }
}

#[tokio::test]
async fn send_notification_returns_message_id() {
    let h = harness(vec![User::new("alice").with_token("tok-a")]);

    let (status, body) = send(
        &h.app,
        call(
            "/sendNotification",
            json!({"userId": "alice", "title": "Hi", "body": "There", "type": "profile_view"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["messageId"], "recorded/1");
    assert_eq!(h.push.sent().len(), 1);
    assert_eq!(h.store.notification_count(), 1);
}

#[tokio::test]
async fn missing_fields_render_invalid_argument() {
    let h = harness(vec![]);

    let (status, body) = send(&h.app, call("/sendNotification", json!({"userId": "alice"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid-argument");
    assert_eq!(
        body["error"]["message"],
        "Missing required fields: userId, title, body"
    );
    assert_eq!(h.push.attempts(), 0);
}

#[tokio::test]
async fn unknown_user_renders_not_found() {
    let h = harness(vec![]);

    let (status, body) = send(
        &h.app,
        call(
            "/sendNotification",
            json!({"userId": "ghost", "title": "Hi", "body": "There"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not-found");
    assert_eq!(body["error"]["message"], "User not found");
}

#[tokio::test]
async fn malformed_json_is_an_invalid_argument() {
    let h = harness(vec![]);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/createMatch")
        .header("content-type", "application/json")
        .body(Body::from("{\"data\": "))
        .unwrap();

    let (status, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid-argument");
}

#[tokio::test]
async fn bulk_requires_a_list_of_user_ids() {
    let h = harness(vec![User::new("a").with_token("tok-a")]);

    let (status, body) = send(
        &h.app,
        call(
            "/sendBulkNotifications",
            json!({"userIds": "a", "title": "T", "body": "B"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Missing required fields: userIds, title, body"
    );

    let (status, body) = send(
        &h.app,
        call(
            "/sendBulkNotifications",
            json!({"userIds": ["a", "nobody"], "title": "T", "body": "B"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["userId"], "a");
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["userId"], "nobody");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["error"], "User not found");
}

#[tokio::test]
async fn create_match_twice_is_a_no_op() {
    let h = harness(vec![
        User::new("bob").with_token("tok-b"),
        User::new("alice").with_token("tok-a"),
    ]);
    let pair = json!({"userId1": "bob", "userId2": "alice"});

    let (status, first) = send(&h.app, call("/createMatch", pair.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["matchId"], "alice_bob");
    assert_eq!(first["created"], true);
    assert_eq!(first["notifications"].as_array().unwrap().len(), 2);

    let (status, second) = send(&h.app, call("/createMatch", pair)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["matchId"], "alice_bob");
    assert_eq!(second["created"], false);
    assert!(second["notifications"].as_array().unwrap().is_empty());
    assert_eq!(h.push.sent().len(), 2);

    let alice = h.store.get_user("alice").await.unwrap().unwrap();
    assert!(alice.matches.contains("bob"));
}

#[tokio::test]
async fn create_match_with_self_is_rejected() {
    let h = harness(vec![User::new("alice")]);

    let (status, body) = send(
        &h.app,
        call("/createMatch", json!({"userId1": "alice", "userId2": "alice"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Cannot match a user with themselves");
}

#[tokio::test]
async fn find_nearby_users_reports_distance() {
    let h = harness(vec![
        User::new("near")
            .with_token("tok-near")
            .with_location(40.7300, -73.9900)
            .with_age(30)
            .complete(),
        User::new("far").with_location(34.0522, -118.2437).with_age(30).complete(),
    ]);

    let (status, body) = send(
        &h.app,
        call(
            "/findNearbyUsers",
            json!({"latitude": 40.7128, "longitude": -74.0060, "maxDistance": 10}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], "near");
    let distance = users[0]["distance"].as_f64().unwrap();
    assert!((distance - 2.34).abs() < 0.05, "distance was {}", distance);
    assert!(users[0].get("fcmToken").is_none());
}

#[tokio::test]
async fn find_nearby_users_requires_coordinates() {
    let h = harness(vec![]);

    let (status, body) = send(&h.app, call("/findNearbyUsers", json!({"latitude": 1.0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Missing required fields: latitude, longitude, maxDistance"
    );
}

#[tokio::test]
async fn user_stats_use_camel_case() {
    let h = harness(vec![User::new("alice").complete()]);

    let (status, body) = send(&h.app, call("/getUserStats", json!({"userId": "alice"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["matches"], 0);
    assert_eq!(body["stats"]["unreadNotifications"], 0);
    assert_eq!(body["stats"]["profileComplete"], true);
}

#[tokio::test]
async fn update_location_stores_coordinates() {
    let h = harness(vec![User::new("alice")]);

    let (status, body) = send(
        &h.app,
        call(
            "/updateUserLocation",
            json!({"userId": "alice", "latitude": 48.8566, "longitude": 2.3522}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"]["latitude"], 48.8566);

    let alice = h.store.get_user("alice").await.unwrap().unwrap();
    let location = alice.location.unwrap();
    assert_eq!(location.longitude, 2.3522);
}

#[tokio::test]
async fn cleanup_only_accepts_delete() {
    let h = harness(vec![]);
    h.store
        .insert_notification(stale_notification("alice", 45))
        .await
        .unwrap();
    h.store
        .insert_notification(stale_notification("alice", 1))
        .await
        .unwrap();

    for method in [Method::GET, Method::POST] {
        let request = Request::builder()
            .method(method)
            .uri("/cleanupOldNotifications")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, Value::String("Method not allowed".to_string()));
    }
    assert_eq!(h.store.notification_count(), 2);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/cleanupOldNotifications")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "deleted": 1}));
    assert_eq!(h.store.notification_count(), 1);
}

#[tokio::test]
async fn cleanup_reports_store_failures() {
    let mut config = AppConfig::default();
    config.retry.max_retries = 0;
    let h = harness_with_config(vec![], config);
    h.store
        .insert_notification(stale_notification("alice", 45))
        .await
        .unwrap();
    h.store.set_offline(true);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/cleanupOldNotifications")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body.get("deleted").is_none());
    let error = body["error"].as_str().expect("error message");
    assert!(!error.is_empty());

    h.store.set_offline(false);
    assert_eq!(h.store.notification_count(), 1);
}

#[tokio::test]
async fn health_follows_the_store() {
    let h = harness(vec![]);
    let get = || {
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&h.app, get()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    h.store.set_offline(true);
    let (status, body) = send(&h.app, get()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store"], false);
}

#[tokio::test]
async fn request_timeout_header_is_honored() {
    let h = harness(vec![User::new("alice").with_token("tok-a")]);

    let mut request = call(
        "/sendNotification",
        json!({"userId": "alice", "title": "Hi", "body": "There"}),
    );
    request
        .headers_mut()
        .insert(REQUEST_TIMEOUT_HEADER, "0".parse().unwrap());
    let (status, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["kind"], "internal");
    assert_eq!(h.push.attempts(), 0);

    let mut request = call("/getUserStats", json!({"userId": "alice"}));
    request
        .headers_mut()
        .insert(REQUEST_TIMEOUT_HEADER, "soon".parse().unwrap());
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
