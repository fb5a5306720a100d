//! The document store interface consumed by the orchestration services.
//!
//! Collections: `users`, `matches`, `notifications` and per-match `messages`.
//! Implementations must give read-after-write consistency per record and
//! apply [`DocumentStore::create_match`] atomically.

use chrono::{DateTime, Utc};
use rendezvous_common::models::{
    Address, Location, MatchRecord, MessageRecord, NotificationRecord, User,
};
use rendezvous_common::BoxFuture;

use crate::error::DbError;

/// Filter for candidate user queries.
///
/// Age bounds are inclusive. Users without an age never satisfy a bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserQuery {
    pub require_location: bool,
    pub profile_complete: Option<bool>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    /// Maximum number of rows returned, ordered by user id
    pub limit: Option<usize>,
}

impl UserQuery {
    /// Located users with a complete profile, the nearby-search candidate pool.
    pub fn discoverable() -> Self {
        Self {
            require_location: true,
            profile_complete: Some(true),
            ..Self::default()
        }
    }

    pub fn with_age_bounds(mut self, min_age: Option<u32>, max_age: Option<u32>) -> Self {
        self.min_age = min_age;
        self.max_age = max_age;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-process evaluation of the filter, shared by stores without a query engine.
    pub fn matches(&self, user: &User) -> bool {
        if self.require_location && user.location.is_none() {
            return false;
        }
        if let Some(complete) = self.profile_complete {
            if user.is_profile_complete != complete {
                return false;
            }
        }
        if let Some(min) = self.min_age {
            if !user.age.is_some_and(|age| age >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_age {
            if !user.age.is_some_and(|age| age <= max) {
                return false;
            }
        }
        true
    }
}

/// Outcome of the atomic match transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchWrite {
    /// A new match record was inserted
    Created(MatchRecord),
    /// A record for the pair already existed; match sets were still reconciled
    AlreadyExists(MatchRecord),
    /// The named user does not exist; nothing was written
    UserMissing(String),
}

impl MatchWrite {
    pub fn record(&self) -> Option<&MatchRecord> {
        match self {
            MatchWrite::Created(record) | MatchWrite::AlreadyExists(record) => Some(record),
            MatchWrite::UserMissing(_) => None,
        }
    }
}

/// Storage capability used by every Rendezvous service.
pub trait DocumentStore: Send + Sync {
    /// Point read of a user, `None` when absent.
    fn get_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Option<User>, DbError>;

    /// Inserts or replaces a user, including its match set.
    fn upsert_user(&self, user: User) -> BoxFuture<'_, (), DbError>;

    /// Filtered query over users, ordered by id.
    fn query_users(&self, query: UserQuery) -> BoxFuture<'_, Vec<User>, DbError>;

    /// Writes a user's location, address and `location_updated_at`.
    ///
    /// Returns `false` when the user does not exist.
    fn update_user_location<'a>(
        &'a self,
        user_id: &'a str,
        location: Location,
        address: Option<Address>,
    ) -> BoxFuture<'a, bool, DbError>;

    /// In one transaction: checks both users exist, inserts the match record
    /// for the canonical pair if absent and adds each user to the other's
    /// match set.
    fn create_match<'a>(
        &'a self,
        user_a: &'a str,
        user_b: &'a str,
        created_at: DateTime<Utc>,
    ) -> BoxFuture<'a, MatchWrite, DbError>;

    fn get_match<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, Option<MatchRecord>, DbError>;

    /// Every match record containing the user.
    fn find_matches_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Vec<MatchRecord>, DbError>;

    fn insert_message(&self, message: MessageRecord) -> BoxFuture<'_, (), DbError>;

    /// Number of message rows under one match.
    fn count_messages<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, u64, DbError>;

    fn insert_notification(&self, notification: NotificationRecord) -> BoxFuture<'_, (), DbError>;

    /// Notifications for one user, oldest first.
    fn list_notifications<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Vec<NotificationRecord>, DbError>;

    fn count_unread_notifications<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, u64, DbError>;

    /// Deletes every notification created strictly before `threshold`, in one batch.
    fn delete_notifications_before(&self, threshold: DateTime<Utc>) -> BoxFuture<'_, u64, DbError>;

    /// Cheap liveness probe.
    fn is_healthy(&self) -> BoxFuture<'_, bool, DbError>;
}
