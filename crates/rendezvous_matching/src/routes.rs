use axum::{
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::{
    cleanup_old_notifications, create_match, find_nearby_users, get_user_stats, health,
    send_bulk_notifications, send_match_notification, send_message_notification,
    send_notification, send_profile_view_notification, update_user_location,
};
use crate::state::MatchingState;

/// Create the Rendezvous routes
///
/// Paths are relative; the backend nests this router under `/api`, giving
/// `POST /api/sendNotification`, `DELETE /api/cleanupOldNotifications` and
/// `GET /api/health`.
///
/// The cleanup endpoint is routed for every method so that anything other
/// than `DELETE` gets the plain-text 405 body the client expects.
pub fn routes(state: Arc<MatchingState>) -> Router {
    info!("Rendezvous routes initialized");

    Router::new()
        .route("/sendNotification", post(send_notification))
        .route("/sendBulkNotifications", post(send_bulk_notifications))
        .route("/findNearbyUsers", post(find_nearby_users))
        .route("/createMatch", post(create_match))
        .route("/getUserStats", post(get_user_stats))
        .route("/sendMatchNotification", post(send_match_notification))
        .route("/sendMessageNotification", post(send_message_notification))
        .route(
            "/sendProfileViewNotification",
            post(send_profile_view_notification),
        )
        .route("/updateUserLocation", post(update_user_location))
        .route("/cleanupOldNotifications", any(cleanup_old_notifications))
        .route("/health", get(health))
        .with_state(state)
}
