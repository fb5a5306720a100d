#![allow(dead_code)]
use rendezvous_common::ErrorKind;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::dispatcher::DeliveryReport;
use crate::handlers::{
    BulkNotificationData, CleanupResponse, CreateMatchResponse, DeliveryResultsResponse,
    FindNearbyData, FindNearbyResponse, HealthResponse, MessageNotificationData, ProfileViewData,
    SendNotificationData, SendNotificationResponse, UpdateLocationData, UpdateLocationResponse,
    UserPairData, UserStatsData, UserStatsResponse,
};
use crate::nearby::NearbyUser;
use crate::stats::UserStats;

/// Error body shared by every callable.
#[derive(Serialize, ToSchema)]
pub struct CallableError {
    pub error: CallableErrorDetail,
}

#[derive(Serialize, ToSchema)]
pub struct CallableErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/sendNotification",
    request_body(content = SendNotificationData, description = "Sent wrapped as {\"data\": ...}",
        example = json!({"data": {
            "userId": "u_123",
            "title": "Hello",
            "body": "Someone liked your photo",
            "type": "general",
            "relatedId": ""
        }})),
    responses(
        (status = 200, description = "Notification sent and logged", body = SendNotificationResponse,
         example = json!({"success": true, "messageId": "projects/rendezvous/messages/0:1712"})),
        (status = 400, description = "Missing userId, title or body", body = CallableError,
         example = json!({"error": {"kind": "invalid-argument", "message": "Missing required fields: userId, title, body"}})),
        (status = 404, description = "Unknown user or no push token", body = CallableError,
         example = json!({"error": {"kind": "not-found", "message": "User not found"}})),
        (status = 500, description = "Store or push failure", body = CallableError)
    ),
    tag = "Notifications"
)]
fn doc_send_notification() {}

#[utoipa::path(
    post,
    path = "/sendBulkNotifications",
    request_body(content = BulkNotificationData, description = "Sent wrapped as {\"data\": ...}",
        example = json!({"data": {
            "userIds": ["u_1", "u_2"],
            "title": "Weekend event",
            "body": "Join us downtown"
        }})),
    responses(
        (status = 200, description = "One result per user id, in input order", body = DeliveryResultsResponse,
         example = json!({"success": true, "results": [
             {"userId": "u_1", "success": true, "messageId": "projects/rendezvous/messages/0:1"},
             {"userId": "u_2", "success": false, "error": "Push token not found for user"}
         ]})),
        (status = 400, description = "userIds is not a list, or title/body missing", body = CallableError)
    ),
    tag = "Notifications"
)]
fn doc_send_bulk_notifications() {}

#[utoipa::path(
    post,
    path = "/findNearbyUsers",
    request_body(content = FindNearbyData, description = "Sent wrapped as {\"data\": ...}",
        example = json!({"data": {
            "latitude": 40.7128,
            "longitude": -74.0060,
            "maxDistance": 10,
            "minAge": 25,
            "maxAge": 35,
            "limit": 20,
            "excludeUserId": "u_123"
        }})),
    responses(
        (status = 200, description = "Matching profiles, closest first", body = FindNearbyResponse),
        (status = 400, description = "Missing or out-of-range search parameters", body = CallableError)
    ),
    tag = "Discovery"
)]
fn doc_find_nearby_users() {}

#[utoipa::path(
    post,
    path = "/createMatch",
    request_body(content = UserPairData, description = "Sent wrapped as {\"data\": ...}",
        example = json!({"data": {"userId1": "alice", "userId2": "bob"}})),
    responses(
        (status = 200, description = "Match created, or already present", body = CreateMatchResponse,
         example = json!({"success": true, "matchId": "alice_bob", "created": true, "notifications": [
             {"userId": "alice", "success": true, "messageId": "projects/rendezvous/messages/0:7"},
             {"userId": "bob", "success": true, "messageId": "projects/rendezvous/messages/0:8"}
         ]})),
        (status = 400, description = "Missing or identical user ids", body = CallableError),
        (status = 404, description = "One of the users does not exist", body = CallableError)
    ),
    tag = "Matches"
)]
fn doc_create_match() {}

#[utoipa::path(
    post,
    path = "/getUserStats",
    request_body(content = UserStatsData, description = "Sent wrapped as {\"data\": ...}",
        example = json!({"data": {"userId": "alice"}})),
    responses(
        (status = 200, description = "Activity counters", body = UserStatsResponse),
        (status = 404, description = "Unknown user", body = CallableError)
    ),
    tag = "Matches"
)]
fn doc_get_user_stats() {}

#[utoipa::path(
    post,
    path = "/sendMatchNotification",
    request_body(content = UserPairData, description = "Sent wrapped as {\"data\": ...}"),
    responses(
        (status = 200, description = "One result per participant", body = DeliveryResultsResponse),
        (status = 400, description = "Missing user ids", body = CallableError)
    ),
    tag = "Notifications"
)]
fn doc_send_match_notification() {}

#[utoipa::path(
    post,
    path = "/sendMessageNotification",
    request_body(content = MessageNotificationData, description = "Sent wrapped as {\"data\": ...}",
        example = json!({"data": {
            "matchId": "alice_bob",
            "senderId": "alice",
            "receiverId": "bob",
            "messageText": "See you at eight?"
        }})),
    responses(
        (status = 200, description = "Receiver notified", body = SendNotificationResponse),
        (status = 400, description = "Missing fields", body = CallableError),
        (status = 404, description = "Unknown receiver or no push token", body = CallableError)
    ),
    tag = "Notifications"
)]
fn doc_send_message_notification() {}

#[utoipa::path(
    post,
    path = "/sendProfileViewNotification",
    request_body(content = ProfileViewData, description = "Sent wrapped as {\"data\": ...}"),
    responses(
        (status = 200, description = "Profile owner notified", body = SendNotificationResponse),
        (status = 400, description = "Missing fields", body = CallableError),
        (status = 404, description = "Unknown user or no push token", body = CallableError)
    ),
    tag = "Notifications"
)]
fn doc_send_profile_view_notification() {}

#[utoipa::path(
    post,
    path = "/updateUserLocation",
    request_body(content = UpdateLocationData, description = "Sent wrapped as {\"data\": ...}",
        example = json!({"data": {"userId": "alice", "latitude": 48.8566, "longitude": 2.3522, "accuracy": 12.5}})),
    responses(
        (status = 200, description = "Location stored", body = UpdateLocationResponse),
        (status = 400, description = "Missing or out-of-range coordinates", body = CallableError),
        (status = 404, description = "Unknown user", body = CallableError)
    ),
    tag = "Discovery"
)]
fn doc_update_user_location() {}

#[utoipa::path(
    delete,
    path = "/cleanupOldNotifications",
    responses(
        (status = 200, description = "Expired notifications deleted", body = CleanupResponse,
         example = json!({"success": true, "deleted": 42})),
        (status = 405, description = "Any method other than DELETE", body = String,
         example = json!("Method not allowed")),
        (status = 500, description = "Store failure", body = CleanupResponse,
         example = json!({"success": false, "error": "database is locked"}))
    ),
    tag = "Maintenance"
)]
fn doc_cleanup_old_notifications() {}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    ),
    tag = "Maintenance"
)]
fn doc_health() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        doc_send_notification,
        doc_send_bulk_notifications,
        doc_find_nearby_users,
        doc_create_match,
        doc_get_user_stats,
        doc_send_match_notification,
        doc_send_message_notification,
        doc_send_profile_view_notification,
        doc_update_user_location,
        doc_cleanup_old_notifications,
        doc_health,
    ),
    components(
        schemas(
            SendNotificationData,
            SendNotificationResponse,
            BulkNotificationData,
            DeliveryResultsResponse,
            DeliveryReport,
            FindNearbyData,
            FindNearbyResponse,
            NearbyUser,
            UserPairData,
            CreateMatchResponse,
            UserStatsData,
            UserStatsResponse,
            UserStats,
            MessageNotificationData,
            ProfileViewData,
            UpdateLocationData,
            UpdateLocationResponse,
            CleanupResponse,
            HealthResponse,
            CallableError,
            CallableErrorDetail,
            ErrorKind,
        )
    ),
    tags(
        (name = "Notifications", description = "Push notifications and their log"),
        (name = "Discovery", description = "Locations and nearby search"),
        (name = "Matches", description = "Match creation and user statistics"),
        (name = "Maintenance", description = "Retention and health")
    ),
    servers(
        (url = "/api", description = "Rendezvous API server")
    )
)]
pub struct RendezvousApiDoc;
