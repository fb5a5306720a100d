//! Location reports from the mobile client.

use chrono::Utc;
use rendezvous_common::models::{Address, GeoPoint, Location};
use rendezvous_common::{
    invalid_argument, not_found, retry_async, CallContext, RendezvousError, RetryConfig,
    ReverseGeocoder,
};
use rendezvous_db::DocumentStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters, 0 when unknown
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LocationReport {
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub location: Location,
    /// Empty when the coordinates could not be resolved
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub address: Address,
}

pub struct LocationUpdater {
    store: Arc<dyn DocumentStore>,
    geocoder: Arc<dyn ReverseGeocoder>,
    retry: RetryConfig,
}

impl LocationUpdater {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        geocoder: Arc<dyn ReverseGeocoder>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            geocoder,
            retry,
        }
    }

    /// Stores a user's position together with its reverse-geocoded address.
    ///
    /// Geocoding is best effort: when the geocoder fails the update is still
    /// written, with an empty address.
    pub async fn update_location(
        &self,
        ctx: &CallContext,
        update: LocationUpdate,
    ) -> Result<LocationReport, RendezvousError> {
        if update.user_id.trim().is_empty() {
            return Err(invalid_argument(
                "Missing required fields: userId, latitude, longitude",
            ));
        }
        let point = GeoPoint::new(update.latitude, update.longitude);
        if !point.is_valid() {
            return Err(invalid_argument(
                "latitude must be within [-90, 90] and longitude within [-180, 180]",
            ));
        }
        let accuracy = update.accuracy.unwrap_or(0.0);
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(invalid_argument("accuracy must be a non-negative number"));
        }

        let exists = retry_async(ctx, &self.retry, "loading user", |_| {
            self.store.get_user(&update.user_id)
        })
        .await?
        .is_some();
        if !exists {
            return Err(not_found("User not found"));
        }

        let address = match ctx.run("reverse geocoding", self.geocoder.reverse(point)).await {
            Ok(resolved) => resolved.unwrap_or_default(),
            Err(e) => {
                warn!(
                    "Reverse geocoding failed for user {}, storing an empty address: {}",
                    update.user_id,
                    e.chain()
                );
                Address::default()
            }
        };

        let location = Location {
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy,
            timestamp: Utc::now(),
        };

        let updated = retry_async(ctx, &self.retry, "updating location", |_| {
            self.store
                .update_user_location(&update.user_id, location.clone(), Some(address.clone()))
        })
        .await?;
        if !updated {
            return Err(not_found("User not found"));
        }

        info!("Updated location for user {}", update.user_id);
        Ok(LocationReport { location, address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_common::models::User;
    use rendezvous_common::{BoxFuture, ErrorKind, GatewayError, NoopGeocoder};
    use rendezvous_db::MemoryDocumentStore;

    struct FixedGeocoder(Result<Address, &'static str>);

    impl ReverseGeocoder for FixedGeocoder {
        fn reverse(&self, _point: GeoPoint) -> BoxFuture<'_, Option<Address>, GatewayError> {
            let result = match &self.0 {
                Ok(address) => Ok(Some(address.clone())),
                Err(message) => Err(GatewayError::transient("geocoder", *message)),
            };
            Box::pin(async move { result })
        }
    }

    fn update(user_id: &str, latitude: f64, longitude: f64) -> LocationUpdate {
        LocationUpdate {
            user_id: user_id.to_string(),
            latitude,
            longitude,
            accuracy: None,
        }
    }

    fn paris() -> Address {
        Address {
            city: Some("Paris".to_string()),
            country: Some("France".to_string()),
            ..Address::default()
        }
    }

    #[tokio::test]
    async fn writes_location_and_resolved_address() {
        let store = Arc::new(MemoryDocumentStore::with_users([User::new("u1")]));
        let updater = LocationUpdater::new(
            store.clone(),
            Arc::new(FixedGeocoder(Ok(paris()))),
            RetryConfig::none(),
        );

        let report = updater
            .update_location(&CallContext::background(), update("u1", 48.8566, 2.3522))
            .await
            .unwrap();

        assert_eq!(report.address, paris());
        assert_eq!(report.location.accuracy, 0.0);
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.address, Some(paris()));
        assert!(user.location_updated_at.is_some());
    }

    #[tokio::test]
    async fn geocoder_failure_degrades_to_empty_address() {
        let store = Arc::new(MemoryDocumentStore::with_users([User::new("u1")]));
        let updater = LocationUpdater::new(
            store.clone(),
            Arc::new(FixedGeocoder(Err("503 Service Unavailable"))),
            RetryConfig::none(),
        );
        let mut request = update("u1", 48.8566, 2.3522);
        request.accuracy = Some(15.0);

        let report = updater
            .update_location(&CallContext::background(), request)
            .await
            .unwrap();

        assert_eq!(report.address, Address::default());
        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.location.map(|l| l.accuracy), Some(15.0));
    }

    #[tokio::test]
    async fn rejects_bad_input_and_unknown_users() {
        let updater = LocationUpdater::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(NoopGeocoder),
            RetryConfig::none(),
        );
        let ctx = CallContext::background();

        let err = updater
            .update_location(&ctx, update("u1", 120.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = updater
            .update_location(&ctx, update(" ", 1.0, 1.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = updater
            .update_location(&ctx, update("ghost", 1.0, 1.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
