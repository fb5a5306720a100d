//! Notification, discovery and match orchestration for Rendezvous
//!
//! The business logic lives in plain service structs that hold the document
//! store and the external gateways behind `Arc<dyn ...>`:
//!
//! - [`NotificationDispatcher`]: one push notification plus its log record
//! - [`BulkDispatchCoordinator`]: the same notification to many users
//! - [`NearbyUserFinder`]: proximity search over discoverable profiles
//! - [`MatchOrchestrator`]: atomic match creation and announcements
//! - [`StatsAggregator`]: per-user counters
//! - [`RetentionSweeper`]: deletion of expired notifications
//! - [`Notices`]: templated match, message and profile-view notifications
//! - [`LocationUpdater`]: location reports with reverse geocoding
//!
//! [`routes`] exposes them as callable HTTP procedures backed by a
//! [`MatchingState`].
//!
//! # Example
//!
//! ```rust,no_run
//! use rendezvous_common::{NoopGeocoder, RecordingPushGateway};
//! use rendezvous_config::AppConfig;
//! use rendezvous_db::MemoryDocumentStore;
//! use rendezvous_matching::{routes, MatchingState};
//! use std::sync::Arc;
//!
//! let state = MatchingState::new(
//!     &AppConfig::default(),
//!     Arc::new(MemoryDocumentStore::new()),
//!     Arc::new(RecordingPushGateway::new()),
//!     Arc::new(NoopGeocoder),
//! );
//! let app: axum::Router = routes(Arc::new(state));
//! ```

pub mod bulk;
pub mod dispatcher;
#[cfg(feature = "openapi")]
pub mod doc;
pub mod geo;
#[cfg(test)]
mod geo_proptest;
pub mod geocoding;
pub mod handlers;
pub mod location;
pub mod matches;
pub mod nearby;
pub mod notices;
pub mod retention;
pub mod routes;
pub mod state;
pub mod stats;

pub use bulk::{BulkDispatchCoordinator, BulkNotification};
pub use dispatcher::{
    DeliveryReport, Dispatched, NotificationDispatcher, NotificationOptions, SendNotification,
};
pub use geo::distance_km;
pub use geocoding::NominatimGeocoder;
pub use handlers::REQUEST_TIMEOUT_HEADER;
pub use location::{LocationReport, LocationUpdate, LocationUpdater};
pub use matches::{MatchOrchestrator, MatchOutcome};
pub use nearby::{NearbyQuery, NearbyUser, NearbyUserFinder};
pub use notices::Notices;
pub use retention::{spawn_sweeper, RetentionSweeper, SweepReport};
pub use routes::routes;
pub use state::MatchingState;
pub use stats::{StatsAggregator, UserStats};

#[cfg(feature = "openapi")]
pub mod openapi {
    pub use crate::doc::RendezvousApiDoc;
}
