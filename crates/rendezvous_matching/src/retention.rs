//! Deletion of expired notification records.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rendezvous_common::{retry_async, CallContext, RendezvousError, RetryConfig};
use rendezvous_db::DocumentStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SweepReport {
    pub deleted: u64,
    #[serde(skip)]
    pub threshold: DateTime<Utc>,
}

pub struct RetentionSweeper {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
    max_age: ChronoDuration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig, max_age_days: i64) -> Self {
        Self {
            store,
            retry,
            max_age: ChronoDuration::days(max_age_days),
        }
    }

    /// Deletes notifications older than the retention window, measured from now.
    pub async fn cleanup(&self, ctx: &CallContext) -> Result<SweepReport, RendezvousError> {
        self.cleanup_at(ctx, Utc::now()).await
    }

    /// Deletes, in one batch, every notification created before `now - max_age`.
    ///
    /// Running it twice in a row deletes nothing the second time.
    pub async fn cleanup_at(
        &self,
        ctx: &CallContext,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, RendezvousError> {
        let threshold = now - self.max_age;
        let deleted = retry_async(ctx, &self.retry, "deleting old notifications", |_| {
            self.store.delete_notifications_before(threshold)
        })
        .await?;

        info!("Deleted {} notifications older than {}", deleted, threshold);
        Ok(SweepReport { deleted, threshold })
    }
}

/// Runs the sweep every `every` until `shutdown` is cancelled.
///
/// The first sweep happens immediately. Each run gets `timeout` as its
/// deadline; a failed run is logged and the loop carries on.
pub fn spawn_sweeper(
    sweeper: Arc<RetentionSweeper>,
    every: Duration,
    timeout: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Retention sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    let ctx = CallContext::with_timeout(timeout)
                        .with_cancellation(shutdown.child_token());
                    if let Err(e) = sweeper.cleanup(&ctx).await {
                        error!("Retention sweep failed: {}", e.chain());
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_common::models::{NotificationRecord, NotificationType};
    use rendezvous_db::MemoryDocumentStore;

    fn aged(id: &str, now: DateTime<Utc>, age: ChronoDuration) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            kind: NotificationType::General,
            related_id: String::new(),
            created_at: now - age,
            is_read: false,
        }
    }

    async fn seeded(now: DateTime<Utc>) -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new());
        for (id, age) in [
            ("ancient", ChronoDuration::days(90)),
            ("expired", ChronoDuration::days(30) + ChronoDuration::seconds(1)),
            ("recent", ChronoDuration::days(29)),
            ("fresh", ChronoDuration::zero()),
        ] {
            store.insert_notification(aged(id, now, age)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn removes_only_expired_records_and_is_idempotent() {
        let now = Utc::now();
        let store = seeded(now).await;
        let sweeper = RetentionSweeper::new(store.clone(), RetryConfig::none(), 30);
        let ctx = CallContext::background();

        let first = sweeper.cleanup_at(&ctx, now).await.unwrap();
        assert_eq!(first.deleted, 2);
        assert_eq!(first.threshold, now - ChronoDuration::days(30));

        let second = sweeper.cleanup_at(&ctx, now).await.unwrap();
        assert_eq!(second.deleted, 0);

        let kept: Vec<_> = store
            .list_notifications("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&"recent".to_string()));
        assert!(kept.contains(&"fresh".to_string()));
    }

    #[tokio::test]
    async fn offline_store_surfaces_internal() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_offline(true);
        let sweeper = RetentionSweeper::new(store, RetryConfig::none(), 30);

        let err = sweeper.cleanup(&CallContext::background()).await.unwrap_err();
        assert_eq!(err.kind(), rendezvous_common::ErrorKind::Internal);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_runs_until_shutdown() {
        let now = Utc::now();
        let store = seeded(now).await;
        let sweeper = Arc::new(RetentionSweeper::new(store.clone(), RetryConfig::none(), 30));
        let shutdown = CancellationToken::new();

        let handle = spawn_sweeper(
            sweeper,
            Duration::from_secs(3600),
            Duration::from_secs(5),
            shutdown.clone(),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.notification_count(), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
