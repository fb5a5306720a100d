//! Match creation.

use chrono::Utc;
use rendezvous_common::{
    invalid_argument, not_found, retry_async, CallContext, RendezvousError, RetryConfig,
};
use rendezvous_db::{DocumentStore, MatchWrite};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::dispatcher::{DeliveryReport, NotificationDispatcher};
use crate::notices::announce_match;

/// Result of [`MatchOrchestrator::create_match`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MatchOutcome {
    pub match_id: String,
    /// `false` when the pair was already matched
    pub created: bool,
    /// One entry per participant, empty when nothing was created
    pub notifications: Vec<DeliveryReport>,
}

/// Creates matches and announces them to both participants.
pub struct MatchOrchestrator {
    store: Arc<dyn DocumentStore>,
    dispatcher: Arc<NotificationDispatcher>,
    retry: RetryConfig,
}

impl MatchOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dispatcher: Arc<NotificationDispatcher>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            retry,
        }
    }

    /// Matches two users.
    ///
    /// The record, and both users' match sets, are written in one store
    /// transaction under the order-independent id `"{smaller}_{larger}"`.
    /// Repeating the call for the same pair, in either order, returns the
    /// existing id with `created = false` and sends nothing. Announcement
    /// failures are reported in [`MatchOutcome::notifications`] and never
    /// undo the match.
    pub async fn create_match(
        &self,
        ctx: &CallContext,
        user_id_1: &str,
        user_id_2: &str,
    ) -> Result<MatchOutcome, RendezvousError> {
        if user_id_1.trim().is_empty() || user_id_2.trim().is_empty() {
            return Err(invalid_argument("Missing required fields: userId1, userId2"));
        }
        if user_id_1 == user_id_2 {
            return Err(invalid_argument("Cannot match a user with themselves"));
        }

        let write = retry_async(ctx, &self.retry, "creating match", |_| {
            self.store.create_match(user_id_1, user_id_2, Utc::now())
        })
        .await?;

        match write {
            MatchWrite::UserMissing(user_id) => {
                Err(not_found(format!("User not found: {}", user_id)))
            }
            MatchWrite::AlreadyExists(record) => {
                info!("Match {} already exists", record.id);
                Ok(MatchOutcome {
                    match_id: record.id,
                    created: false,
                    notifications: Vec::new(),
                })
            }
            MatchWrite::Created(record) => {
                info!("Created match {}", record.id);
                let notifications =
                    announce_match(&self.dispatcher, ctx, user_id_1, user_id_2).await;
                Ok(MatchOutcome {
                    match_id: record.id,
                    created: true,
                    notifications,
                })
            }
        }
    }
}
