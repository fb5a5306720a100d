//! Per-user activity counters.

use chrono::{DateTime, SecondsFormat, Utc};
use rendezvous_common::{
    invalid_argument, not_found, retry_async, CallContext, RendezvousError, RetryConfig,
};
use rendezvous_db::DocumentStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserStats {
    pub matches: u64,
    pub messages: u64,
    pub unread_notifications: u64,
    pub profile_complete: bool,
    /// RFC 3339, `null` when never recorded
    pub last_activity: Option<String>,
    pub created_at: Option<String>,
}

pub struct StatsAggregator {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Counts a user's matches, messages and unread notifications.
    ///
    /// `messages` is summed over every match record containing the user with
    /// one count query per match, so the cost grows linearly with the number
    /// of matches.
    pub async fn get_stats(
        &self,
        ctx: &CallContext,
        user_id: &str,
    ) -> Result<UserStats, RendezvousError> {
        if user_id.trim().is_empty() {
            return Err(invalid_argument("Missing required field: userId"));
        }

        let user = retry_async(ctx, &self.retry, "loading user", |_| {
            self.store.get_user(user_id)
        })
        .await?
        .ok_or_else(|| not_found("User not found"))?;

        let records = retry_async(ctx, &self.retry, "listing matches", |_| {
            self.store.find_matches_for_user(user_id)
        })
        .await?;

        let mut messages = 0;
        for record in &records {
            messages += retry_async(ctx, &self.retry, "counting messages", |_| {
                self.store.count_messages(&record.id)
            })
            .await?;
        }

        let unread_notifications = retry_async(ctx, &self.retry, "counting notifications", |_| {
            self.store.count_unread_notifications(user_id)
        })
        .await?;

        Ok(UserStats {
            matches: user.matches.len() as u64,
            messages,
            unread_notifications,
            profile_complete: user.is_profile_complete,
            last_activity: user.last_activity.as_ref().map(rfc3339),
            created_at: user.created_at.as_ref().map(rfc3339),
        })
    }
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rendezvous_common::models::{
        MessageRecord, NotificationRecord, NotificationType, User,
    };
    use rendezvous_common::ErrorKind;
    use rendezvous_db::MemoryDocumentStore;

    fn message(match_id: &str, n: usize) -> MessageRecord {
        MessageRecord {
            id: format!("{}-{}", match_id, n),
            match_id: match_id.to_string(),
            sender_id: "alice".to_string(),
            text: "hey".to_string(),
            created_at: Utc::now(),
        }
    }

    fn notification(id: &str, is_read: bool) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            user_id: "alice".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            kind: NotificationType::General,
            related_id: String::new(),
            created_at: Utc::now(),
            is_read,
        }
    }

    #[tokio::test]
    async fn counts_matches_messages_and_unread() {
        let mut alice = User::new("alice").complete();
        alice.created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single();
        alice.last_activity = None;
        let store = Arc::new(MemoryDocumentStore::with_users([
            alice,
            User::new("bob"),
            User::new("carol"),
        ]));
        store.create_match("alice", "bob", Utc::now()).await.unwrap();
        store.create_match("carol", "alice", Utc::now()).await.unwrap();
        for n in 0..3 {
            store.insert_message(message("alice_bob", n)).await.unwrap();
        }
        store.insert_message(message("alice_carol", 0)).await.unwrap();
        store.insert_message(message("bob_carol", 0)).await.unwrap();
        store.insert_notification(notification("n1", false)).await.unwrap();
        store.insert_notification(notification("n2", true)).await.unwrap();

        let stats = StatsAggregator::new(store, RetryConfig::none())
            .get_stats(&CallContext::background(), "alice")
            .await
            .unwrap();

        assert_eq!(
            stats,
            UserStats {
                matches: 2,
                messages: 4,
                unread_notifications: 1,
                profile_complete: true,
                last_activity: None,
                created_at: Some("2024-03-01T12:00:00.000Z".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn unknown_and_blank_users_are_rejected() {
        let stats = StatsAggregator::new(Arc::new(MemoryDocumentStore::new()), RetryConfig::none());
        let ctx = CallContext::background();

        let err = stats.get_stats(&ctx, "ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = stats.get_stats(&ctx, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
