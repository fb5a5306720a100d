//! Fan-out of one notification to many users.

use futures::stream::{self, StreamExt};
use rendezvous_common::{invalid_argument, CallContext, RendezvousError};
use std::sync::Arc;
use tracing::info;

use crate::dispatcher::{
    DeliveryReport, NotificationDispatcher, NotificationOptions, SendNotification,
};

/// One notification addressed to many users.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkNotification {
    pub user_ids: Vec<String>,
    pub title: String,
    pub body: String,
    pub options: NotificationOptions,
}

pub struct BulkDispatchCoordinator {
    dispatcher: Arc<NotificationDispatcher>,
    max_concurrency: usize,
}

impl BulkDispatchCoordinator {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, max_concurrency: usize) -> Self {
        Self {
            dispatcher,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Sends to every user independently, at most `max_concurrency` at a time.
    ///
    /// The reports line up with `user_ids`. A failed recipient is recorded in
    /// its own report and does not stop the others, so this only fails on
    /// invalid input.
    pub async fn send_bulk(
        &self,
        ctx: &CallContext,
        request: BulkNotification,
    ) -> Result<Vec<DeliveryReport>, RendezvousError> {
        if request.title.trim().is_empty() || request.body.trim().is_empty() {
            return Err(invalid_argument(
                "Missing required fields: userIds, title, body",
            ));
        }

        let BulkNotification {
            user_ids,
            title,
            body,
            options,
        } = request;

        let reports: Vec<DeliveryReport> = stream::iter(user_ids)
            .map(|user_id| {
                let notification =
                    SendNotification::new(user_id.clone(), title.clone(), body.clone())
                        .with_options(options.clone());
                async move {
                    let result = self.dispatcher.send(ctx, notification).await;
                    DeliveryReport::from_result(&user_id, result)
                }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let delivered = reports.iter().filter(|r| r.success).count();
        info!(
            "Bulk notification delivered to {}/{} users",
            delivered,
            reports.len()
        );
        Ok(reports)
    }
}
