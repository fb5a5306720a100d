//! Services shared by the callable handlers.

use rendezvous_common::{CallContext, PushGateway, RetryConfig, ReverseGeocoder};
use rendezvous_config::AppConfig;
use rendezvous_db::DocumentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::bulk::BulkDispatchCoordinator;
use crate::dispatcher::NotificationDispatcher;
use crate::location::LocationUpdater;
use crate::matches::MatchOrchestrator;
use crate::nearby::NearbyUserFinder;
use crate::notices::Notices;
use crate::retention::RetentionSweeper;
use crate::stats::StatsAggregator;

/// Every orchestration service, wired once against the same store and gateways.
pub struct MatchingState {
    pub dispatcher: Arc<NotificationDispatcher>,
    pub bulk: BulkDispatchCoordinator,
    pub nearby: NearbyUserFinder,
    pub matches: MatchOrchestrator,
    pub stats: StatsAggregator,
    pub retention: Arc<RetentionSweeper>,
    pub notices: Notices,
    pub location: LocationUpdater,
    store: Arc<dyn DocumentStore>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl MatchingState {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn DocumentStore>,
        push: Arc<dyn PushGateway>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        let retry = RetryConfig::from(&config.retry);
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), push, retry));

        Self {
            bulk: BulkDispatchCoordinator::new(dispatcher.clone(), config.bulk.max_concurrency),
            nearby: NearbyUserFinder::new(store.clone(), retry, config.nearby.clone()),
            matches: MatchOrchestrator::new(store.clone(), dispatcher.clone(), retry),
            stats: StatsAggregator::new(store.clone(), retry),
            retention: Arc::new(RetentionSweeper::new(
                store.clone(),
                retry,
                config.retention.max_age_days,
            )),
            notices: Notices::new(dispatcher.clone()),
            location: LocationUpdater::new(store.clone(), geocoder, retry),
            dispatcher,
            store,
            request_timeout: Duration::from_millis(config.server.request_timeout_ms),
            shutdown: CancellationToken::new(),
        }
    }

    /// Ties every call context to `token`, so in-flight calls stop on shutdown.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// A context for one request, with `timeout` or the configured default.
    pub fn call_context(&self, timeout: Option<Duration>) -> CallContext {
        CallContext::with_timeout(timeout.unwrap_or(self.request_timeout))
            .with_cancellation(self.shutdown.child_token())
    }
}
