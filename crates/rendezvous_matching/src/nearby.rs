//! Proximity search over discoverable users.

use rendezvous_common::models::{GeoPoint, User};
use rendezvous_common::{invalid_argument, retry_async, CallContext, RendezvousError, RetryConfig};
use rendezvous_config::NearbyConfig;
use rendezvous_db::{DocumentStore, UserQuery};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::geo::distance_km;

/// Parameters of a proximity search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub origin: GeoPoint,
    pub max_distance_km: f64,
    /// Inclusive lower age bound
    pub min_age: Option<u32>,
    /// Inclusive upper age bound
    pub max_age: Option<u32>,
    /// Result cap, the configured default when `None`
    pub limit: Option<usize>,
    pub exclude_user_id: Option<String>,
}

impl NearbyQuery {
    pub fn new(origin: GeoPoint, max_distance_km: f64) -> Self {
        Self {
            origin,
            max_distance_km,
            min_age: None,
            max_age: None,
            limit: None,
            exclude_user_id: None,
        }
    }

    fn validate(&self) -> Result<(), RendezvousError> {
        if !self.origin.is_valid() {
            return Err(invalid_argument(
                "latitude must be within [-90, 90] and longitude within [-180, 180]",
            ));
        }
        if !self.max_distance_km.is_finite() || self.max_distance_km < 0.0 {
            return Err(invalid_argument(
                "maxDistance must be a non-negative number of kilometers",
            ));
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(invalid_argument("minAge must not exceed maxAge"));
            }
        }
        if self.limit == Some(0) {
            return Err(invalid_argument("limit must be at least 1"));
        }
        Ok(())
    }
}

/// A search hit: the profile without its push token, plus its distance from
/// the origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NearbyUser {
    #[serde(flatten)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub user: User,
    #[serde(rename = "distance")]
    pub distance_km: f64,
}

/// Finds located, complete profiles within a radius.
pub struct NearbyUserFinder {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
    config: NearbyConfig,
}

impl NearbyUserFinder {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig, config: NearbyConfig) -> Self {
        Self {
            store,
            retry,
            config,
        }
    }

    /// Users within `max_distance_km` of the origin, closest first.
    ///
    /// Distance filtering happens before the result limit is applied, so the
    /// store is asked for every discoverable candidate (bounded by
    /// `candidate_scan_cap`) rather than for the first `limit` rows. Ties in
    /// distance are ordered by user id.
    pub async fn find(
        &self,
        ctx: &CallContext,
        query: NearbyQuery,
    ) -> Result<Vec<NearbyUser>, RendezvousError> {
        query.validate()?;
        let limit = query.limit.unwrap_or(self.config.default_limit);

        let scan = UserQuery::discoverable()
            .with_age_bounds(query.min_age, query.max_age)
            .with_limit(self.config.candidate_scan_cap);
        let candidates = retry_async(ctx, &self.retry, "querying nearby candidates", |_| {
            self.store.query_users(scan.clone())
        })
        .await?;

        if candidates.len() >= self.config.candidate_scan_cap {
            warn!(
                "Nearby search hit the candidate scan cap of {}; results may be incomplete",
                self.config.candidate_scan_cap
            );
        }
        let scanned = candidates.len();

        let mut hits: Vec<NearbyUser> = candidates
            .into_iter()
            .filter(|user| query.exclude_user_id.as_deref() != Some(user.id.as_str()))
            .filter_map(|mut user| {
                let distance = distance_km(query.origin, user.location.as_ref()?.point());
                if distance > query.max_distance_km {
                    return None;
                }
                user.fcm_token = None;
                Some(NearbyUser {
                    user,
                    distance_km: distance,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.user.id.cmp(&b.user.id))
        });
        hits.truncate(limit);

        debug!(
            "Nearby search scanned {} candidates, returning {}",
            scanned,
            hits.len()
        );
        Ok(hits)
    }
}
