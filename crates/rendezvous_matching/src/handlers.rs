//! HTTP handlers for the callable procedures
//!
//! Callables are `POST` endpoints taking `{"data": {...}}` with camelCase
//! fields, the shape the mobile client sends. Handlers only unwrap the
//! envelope, check that required fields are present and hand off to the
//! services in [`MatchingState`]; errors render as
//! `{"error": {"kind", "message"}}` with status 400, 404 or 500.
//!
//! Every handler derives its deadline from the `x-request-timeout-ms` header,
//! falling back to `server.request_timeout_ms`.

use axum::{
    extract::{FromRequest, FromRequestParts, Json, Request, State},
    http::{request::Parts, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use rendezvous_common::models::{Address, GeoPoint, Location, NotificationType};
use rendezvous_common::{invalid_argument, CallContext, RendezvousError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::bulk::BulkNotification;
use crate::dispatcher::{DeliveryReport, NotificationOptions, SendNotification};
use crate::location::LocationUpdate;
use crate::nearby::{NearbyQuery, NearbyUser};
use crate::state::MatchingState;
use crate::stats::UserStats;

/// Header carrying the caller's deadline in milliseconds.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

// --- Extractors ---

/// The per-request [`CallContext`].
pub struct RequestContext(pub CallContext);

fn context_from_headers(
    state: &MatchingState,
    headers: &HeaderMap,
) -> Result<CallContext, RendezvousError> {
    let timeout = match headers.get(REQUEST_TIMEOUT_HEADER) {
        None => None,
        Some(value) => {
            let millis = value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    invalid_argument(format!(
                        "{} must be a whole number of milliseconds",
                        REQUEST_TIMEOUT_HEADER
                    ))
                })?;
            Some(Duration::from_millis(millis))
        }
    };
    Ok(state.call_context(timeout))
}

impl FromRequestParts<Arc<MatchingState>> for RequestContext {
    type Rejection = RendezvousError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<MatchingState>,
    ) -> Result<Self, Self::Rejection> {
        context_from_headers(state, &parts.headers).map(RequestContext)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
}

/// The `data` member of a callable request body.
///
/// A missing `data` member yields `T::default()`, so absent fields are
/// reported by the field checks. Malformed JSON is an invalid argument.
pub struct Callable<T>(pub T);

impl<S, T> FromRequest<S> for Callable<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = RendezvousError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(envelope) = Json::<Envelope<T>>::from_request(req, state)
            .await
            .map_err(|rejection| invalid_argument(rejection.body_text()))?;
        Ok(Callable(envelope.data.unwrap_or_default()))
    }
}

fn notification_options(
    kind: Option<String>,
    related_id: Option<String>,
) -> Result<NotificationOptions, RendezvousError> {
    let kind = match kind.as_deref().map(str::trim) {
        None | Some("") => NotificationType::default(),
        Some(raw) => raw.parse::<NotificationType>().map_err(invalid_argument)?,
    };
    Ok(NotificationOptions::new(kind, related_id.unwrap_or_default()))
}

// --- Request and response types ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendNotificationData {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    /// `general` (default), `new_match`, `new_message` or `profile_view`
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub related_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendNotificationResponse {
    pub success: bool,
    /// Delivery identifier assigned by the push transport
    pub message_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BulkNotificationData {
    /// Must be a JSON array of user ids
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub user_ids: Option<serde_json::Value>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub related_id: Option<String>,
}

/// Shared by bulk sends and match notifications: one entry per recipient.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeliveryResultsResponse {
    pub success: bool,
    pub results: Vec<DeliveryReport>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FindNearbyData {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Search radius in kilometers
    #[serde(alias = "maxDistanceKm")]
    pub max_distance: Option<f64>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    /// Defaults to `nearby.default_limit` (50)
    pub limit: Option<usize>,
    pub exclude_user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FindNearbyResponse {
    pub success: bool,
    pub users: Vec<NearbyUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserPairData {
    pub user_id1: Option<String>,
    pub user_id2: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateMatchResponse {
    pub success: bool,
    pub match_id: String,
    /// `false` when the pair was already matched
    pub created: bool,
    pub notifications: Vec<DeliveryReport>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserStatsData {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserStatsResponse {
    pub success: bool,
    pub stats: UserStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageNotificationData {
    pub match_id: Option<String>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub message_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfileViewData {
    pub profile_user_id: Option<String>,
    pub viewer_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateLocationData {
    pub user_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Meters, 0 when omitted
    pub accuracy: Option<f64>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateLocationResponse {
    pub success: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub location: Location,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub address: Address,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CleanupResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,
    pub store: bool,
}

// --- Callables ---

#[axum::debug_handler]
pub async fn send_notification(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<SendNotificationData>,
) -> Result<Json<SendNotificationResponse>, RendezvousError> {
    let options = notification_options(data.kind, data.related_id)?;
    let request = SendNotification::new(
        data.user_id.unwrap_or_default(),
        data.title.unwrap_or_default(),
        data.body.unwrap_or_default(),
    )
    .with_options(options);

    let dispatched = state.dispatcher.send(&ctx, request).await?;
    Ok(Json(SendNotificationResponse {
        success: true,
        message_id: dispatched.message_id,
    }))
}

#[axum::debug_handler]
pub async fn send_bulk_notifications(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<BulkNotificationData>,
) -> Result<Json<DeliveryResultsResponse>, RendezvousError> {
    let user_ids = match data.user_ids {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(id) => Ok(id),
                other => Err(invalid_argument(format!(
                    "userIds must contain only strings, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(invalid_argument(
                "Missing required fields: userIds, title, body",
            ))
        }
    };

    let request = BulkNotification {
        user_ids,
        title: data.title.unwrap_or_default(),
        body: data.body.unwrap_or_default(),
        options: notification_options(data.kind, data.related_id)?,
    };

    let results = state.bulk.send_bulk(&ctx, request).await?;
    Ok(Json(DeliveryResultsResponse {
        success: true,
        results,
    }))
}

#[axum::debug_handler]
pub async fn find_nearby_users(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<FindNearbyData>,
) -> Result<Json<FindNearbyResponse>, RendezvousError> {
    let (Some(latitude), Some(longitude), Some(max_distance)) =
        (data.latitude, data.longitude, data.max_distance)
    else {
        return Err(invalid_argument(
            "Missing required fields: latitude, longitude, maxDistance",
        ));
    };

    let query = NearbyQuery {
        origin: GeoPoint::new(latitude, longitude),
        max_distance_km: max_distance,
        min_age: data.min_age,
        max_age: data.max_age,
        limit: data.limit,
        exclude_user_id: data.exclude_user_id,
    };

    let users = state.nearby.find(&ctx, query).await?;
    Ok(Json(FindNearbyResponse {
        success: true,
        users,
    }))
}

#[axum::debug_handler]
pub async fn create_match(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<UserPairData>,
) -> Result<Json<CreateMatchResponse>, RendezvousError> {
    let outcome = state
        .matches
        .create_match(
            &ctx,
            data.user_id1.as_deref().unwrap_or_default(),
            data.user_id2.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(CreateMatchResponse {
        success: true,
        match_id: outcome.match_id,
        created: outcome.created,
        notifications: outcome.notifications,
    }))
}

#[axum::debug_handler]
pub async fn get_user_stats(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<UserStatsData>,
) -> Result<Json<UserStatsResponse>, RendezvousError> {
    let stats = state
        .stats
        .get_stats(&ctx, data.user_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(UserStatsResponse {
        success: true,
        stats,
    }))
}

#[axum::debug_handler]
pub async fn send_match_notification(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<UserPairData>,
) -> Result<Json<DeliveryResultsResponse>, RendezvousError> {
    let results = state
        .notices
        .send_match_notification(
            &ctx,
            data.user_id1.as_deref().unwrap_or_default(),
            data.user_id2.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(DeliveryResultsResponse {
        success: true,
        results,
    }))
}

#[axum::debug_handler]
pub async fn send_message_notification(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<MessageNotificationData>,
) -> Result<Json<SendNotificationResponse>, RendezvousError> {
    let dispatched = state
        .notices
        .send_message_notification(
            &ctx,
            data.match_id.as_deref().unwrap_or_default(),
            data.sender_id.as_deref().unwrap_or_default(),
            data.receiver_id.as_deref().unwrap_or_default(),
            data.message_text.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(SendNotificationResponse {
        success: true,
        message_id: dispatched.message_id,
    }))
}

#[axum::debug_handler]
pub async fn send_profile_view_notification(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<ProfileViewData>,
) -> Result<Json<SendNotificationResponse>, RendezvousError> {
    let dispatched = state
        .notices
        .send_profile_view_notification(
            &ctx,
            data.profile_user_id.as_deref().unwrap_or_default(),
            data.viewer_id.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(SendNotificationResponse {
        success: true,
        message_id: dispatched.message_id,
    }))
}

#[axum::debug_handler]
pub async fn update_user_location(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
    Callable(data): Callable<UpdateLocationData>,
) -> Result<Json<UpdateLocationResponse>, RendezvousError> {
    let (Some(user_id), Some(latitude), Some(longitude)) =
        (data.user_id, data.latitude, data.longitude)
    else {
        return Err(invalid_argument(
            "Missing required fields: userId, latitude, longitude",
        ));
    };

    let report = state
        .location
        .update_location(
            &ctx,
            LocationUpdate {
                user_id,
                latitude,
                longitude,
                accuracy: data.accuracy,
            },
        )
        .await?;

    Ok(Json(UpdateLocationResponse {
        success: true,
        location: report.location,
        address: report.address,
    }))
}

// --- Plain HTTP endpoints ---

/// Deletes expired notifications. Only `DELETE` is accepted.
pub async fn cleanup_old_notifications(
    State(state): State<Arc<MatchingState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method != Method::DELETE {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let result = match context_from_headers(&state, &headers) {
        Ok(ctx) => state.retention.cleanup(&ctx).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => Json(CleanupResponse {
            success: true,
            deleted: Some(report.deleted),
            error: None,
        })
        .into_response(),
        Err(e) => {
            error!("Error cleaning up old notifications: {}", e.chain());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CleanupResponse {
                    success: false,
                    deleted: None,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Reports whether the document store answers.
#[axum::debug_handler]
pub async fn health(
    State(state): State<Arc<MatchingState>>,
    RequestContext(ctx): RequestContext,
) -> Response {
    let store_ok = match ctx.run("checking store health", state.store().is_healthy()).await {
        Ok(healthy) => healthy,
        Err(e) => {
            error!("Store health check failed: {}", e.chain());
            false
        }
    };

    let (status, label) = if store_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            store: store_ok,
        }),
    )
        .into_response()
}
