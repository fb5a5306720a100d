//! Single-recipient push delivery with a notification log entry.
//!
//! [`NotificationDispatcher::send`] is the one path every notification takes:
//! the public `sendNotification` callable, bulk sends, match announcements and
//! the templated notices all go through it, so validation and error kinds are
//! applied the same way everywhere.

use chrono::{SecondsFormat, Utc};
use rendezvous_common::models::{NotificationRecord, NotificationType};
use rendezvous_common::{
    invalid_argument, not_found, retry_async, CallContext, ErrorKind, PushGateway, PushMessage,
    PushPriority, RendezvousError, RetryConfig,
};
use rendezvous_db::DocumentStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Sound requested for every notification.
pub const DEFAULT_SOUND: &str = "default";

/// Optional routing fields of a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    /// Defaults to [`NotificationType::General`]
    pub kind: NotificationType,
    /// Id of the record the notification is about, empty when none
    pub related_id: String,
}

impl NotificationOptions {
    pub fn new(kind: NotificationType, related_id: impl Into<String>) -> Self {
        Self {
            kind,
            related_id: related_id.into(),
        }
    }
}

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq)]
pub struct SendNotification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub options: NotificationOptions,
}

impl SendNotification {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            body: body.into(),
            options: NotificationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: NotificationOptions) -> Self {
        self.options = options;
        self
    }

    fn validate(&self) -> Result<(), RendezvousError> {
        if self.user_id.trim().is_empty()
            || self.title.trim().is_empty()
            || self.body.trim().is_empty()
        {
            return Err(invalid_argument(
                "Missing required fields: userId, title, body",
            ));
        }
        Ok(())
    }
}

/// Result of a delivered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatched {
    /// Identifier assigned by the push transport
    pub message_id: String,
}

/// Per-recipient outcome used by bulk sends and match announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeliveryReport {
    pub user_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn from_result(user_id: &str, result: Result<Dispatched, RendezvousError>) -> Self {
        match result {
            Ok(dispatched) => Self {
                user_id: user_id.to_string(),
                success: true,
                message_id: Some(dispatched.message_id),
                error: None,
            },
            Err(err) => Self {
                user_id: user_id.to_string(),
                success: false,
                message_id: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Sends push notifications and logs each successful one.
pub struct NotificationDispatcher {
    store: Arc<dyn DocumentStore>,
    push: Arc<dyn PushGateway>,
    retry: RetryConfig,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        push: Arc<dyn PushGateway>,
        retry: RetryConfig,
    ) -> Self {
        Self { store, push, retry }
    }

    /// Delivers one notification and appends its log record.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` when `user_id`, `title` or `body` is blank
    /// - `NotFound` when the user or their push token does not exist
    /// - `Internal` for store, gateway, deadline and cancellation failures
    pub async fn send(
        &self,
        ctx: &CallContext,
        request: SendNotification,
    ) -> Result<Dispatched, RendezvousError> {
        request.validate()?;

        let result = self.deliver(ctx, &request).await;
        match &result {
            Ok(dispatched) => info!(
                "Sent {} notification {} to user {}",
                request.options.kind, dispatched.message_id, request.user_id
            ),
            Err(err) if err.kind() == ErrorKind::Internal => error!(
                "Error sending notification to user {}: {}",
                request.user_id,
                err.chain()
            ),
            Err(err) => debug!(
                "Notification to user {} rejected: {}",
                request.user_id, err
            ),
        }
        result
    }

    async fn deliver(
        &self,
        ctx: &CallContext,
        request: &SendNotification,
    ) -> Result<Dispatched, RendezvousError> {
        let user = retry_async(ctx, &self.retry, "loading user", |_| {
            self.store.get_user(&request.user_id)
        })
        .await?
        .ok_or_else(|| not_found("User not found"))?;

        let token = user
            .fcm_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| not_found("Push token not found for user"))?;

        let sent_at = Utc::now();
        let timestamp = sent_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let message = build_push_message(token, request, &timestamp);

        let message_id = retry_async(ctx, &self.retry, "sending push notification", |_| {
            self.push.send(message.clone())
        })
        .await?;

        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            kind: request.options.kind,
            related_id: request.options.related_id.clone(),
            created_at: sent_at,
            is_read: false,
        };
        retry_async(ctx, &self.retry, "logging notification", |_| {
            self.store.insert_notification(record.clone())
        })
        .await?;

        Ok(Dispatched { message_id })
    }
}

fn build_push_message(token: String, request: &SendNotification, timestamp: &str) -> PushMessage {
    let data = BTreeMap::from([
        ("type".to_string(), request.options.kind.to_string()),
        ("relatedId".to_string(), request.options.related_id.clone()),
        ("timestamp".to_string(), timestamp.to_string()),
    ]);

    PushMessage {
        token,
        title: request.title.clone(),
        body: request.body.clone(),
        sound: DEFAULT_SOUND.to_string(),
        data,
        priority: PushPriority::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_common::models::User;
    use rendezvous_common::RecordingPushGateway;
    use rendezvous_db::MemoryDocumentStore;
    use std::time::Duration;

    type Fixture = (
        Arc<MemoryDocumentStore>,
        Arc<RecordingPushGateway>,
        NotificationDispatcher,
    );

    fn setup(users: Vec<User>) -> Fixture {
        let store = Arc::new(MemoryDocumentStore::with_users(users));
        let push = Arc::new(RecordingPushGateway::new());
        let dispatcher = NotificationDispatcher::new(
            store.clone(),
            push.clone(),
            RetryConfig::default()
                .with_max_retries(2)
                .with_jitter(false),
        );
        (store, push, dispatcher)
    }

    #[tokio::test]
    async fn delivers_and_logs_one_unread_record() {
        let (store, push, dispatcher) = setup(vec![User::new("u1").with_token("tok-1")]);

        let dispatched = dispatcher
            .send(
                &CallContext::background(),
                SendNotification::new("u1", "Hello", "World"),
            )
            .await
            .unwrap();

        assert_eq!(dispatched.message_id, "recorded/1");
        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-1");
        assert_eq!(sent[0].sound, "default");
        assert_eq!(sent[0].priority, PushPriority::High);
        assert_eq!(sent[0].data["type"], "general");
        assert_eq!(sent[0].data["relatedId"], "");
        assert!(sent[0].data["timestamp"].ends_with('Z'));

        let log = store.list_notifications("u1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(!log[0].is_read);
        assert_eq!(log[0].kind, NotificationType::General);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_before_any_io() {
        let (store, push, dispatcher) = setup(vec![]);
        store.set_offline(true);

        for request in [
            SendNotification::new("", "t", "b"),
            SendNotification::new("u1", "  ", "b"),
            SendNotification::new("u1", "t", ""),
        ] {
            let err = dispatcher
                .send(&CallContext::background(), request)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(push.attempts(), 0);
    }

    #[tokio::test]
    async fn unknown_user_and_missing_token_are_not_found() {
        let (store, push, dispatcher) = setup(vec![User::new("tokenless")]);
        let ctx = CallContext::background();

        let err = dispatcher
            .send(&ctx, SendNotification::new("ghost", "t", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "User not found");

        let err = dispatcher
            .send(&ctx, SendNotification::new("tokenless", "t", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Push token not found for user");

        assert_eq!(push.attempts(), 0);
        assert_eq!(store.notification_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_gateway_errors_are_retried_and_logged_once() {
        let (store, push, dispatcher) = setup(vec![User::new("u1").with_token("tok")]);
        push.fail_next(true, "503 Service Unavailable");
        push.fail_next(true, "503 Service Unavailable");

        dispatcher
            .send(&CallContext::background(), SendNotification::new("u1", "t", "b"))
            .await
            .unwrap();

        assert_eq!(push.attempts(), 3);
        assert_eq!(store.notification_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_gateway_errors_surface_as_internal() {
        let (store, push, dispatcher) = setup(vec![User::new("u1").with_token("stale")]);
        push.reject_token("stale");

        let err = dispatcher
            .send(&CallContext::background(), SendNotification::new("u1", "t", "b"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(push.attempts(), 1);
        assert_eq!(store.notification_count(), 0);
    }

    #[tokio::test]
    async fn expired_deadline_never_reaches_the_gateway() {
        let (store, push, dispatcher) = setup(vec![User::new("u1").with_token("tok")]);
        let ctx = CallContext::with_timeout(Duration::ZERO);

        let err = dispatcher
            .send(&ctx, SendNotification::new("u1", "t", "b"))
            .await
            .unwrap_err();

        assert!(matches!(err, RendezvousError::Timeout(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(push.attempts(), 0);
        assert_eq!(store.notification_count(), 0);
    }

    #[test]
    fn reports_carry_the_error_text() {
        let report = DeliveryReport::from_result("u9", Err(not_found("User not found")));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"userId": "u9", "success": false, "error": "User not found"})
        );
    }
}
