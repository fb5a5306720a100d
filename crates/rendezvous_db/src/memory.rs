//! In-process document store.
//!
//! Backs `database.url = "memory:"` for local development and the test suites.
//! Every operation runs under one lock, which makes `create_match` atomic.
//! Transient faults can be injected to exercise retry paths.

use chrono::{DateTime, Utc};
use rendezvous_common::models::{
    Address, Location, MatchRecord, MessageRecord, NotificationRecord, User,
};
use rendezvous_common::BoxFuture;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::DbError;
use crate::store::{DocumentStore, MatchWrite, UserQuery};

#[derive(Debug, Default)]
struct Collections {
    users: BTreeMap<String, User>,
    matches: BTreeMap<String, MatchRecord>,
    messages: BTreeMap<String, Vec<MessageRecord>>,
    notifications: Vec<NotificationRecord>,
}

/// A [`DocumentStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
    pending_faults: AtomicU32,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `users`.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let store = Self::new();
        if let Ok(mut collections) = store.collections.lock() {
            for user in users {
                collections.users.insert(user.id.clone(), user);
            }
        }
        store
    }

    /// Makes the next `count` operations fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.pending_faults.store(count, Ordering::SeqCst);
    }

    /// While offline every operation fails with a transient error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total number of notification records across all users.
    pub fn notification_count(&self) -> usize {
        self.collections
            .lock()
            .map(|collections| collections.notifications.len())
            .unwrap_or_default()
    }

    fn open(&self) -> Result<MutexGuard<'_, Collections>, DbError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("store offline".to_string()));
        }
        let injected = self
            .pending_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DbError::Unavailable("injected transient fault".to_string()));
        }
        self.collections
            .lock()
            .map_err(|_| DbError::Unavailable("store lock poisoned".to_string()))
    }

    fn run<'a, T, F>(&'a self, op: F) -> BoxFuture<'a, T, DbError>
    where
        T: Send + 'a,
        F: FnOnce(&mut Collections) -> T,
    {
        let result = self.open().map(|mut collections| op(&mut collections));
        Box::pin(std::future::ready(result))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Option<User>, DbError> {
        self.run(|c| c.users.get(user_id).cloned())
    }

    fn upsert_user(&self, user: User) -> BoxFuture<'_, (), DbError> {
        self.run(|c| {
            c.users.insert(user.id.clone(), user);
        })
    }

    fn query_users(&self, query: UserQuery) -> BoxFuture<'_, Vec<User>, DbError> {
        self.run(|c| {
            let limit = query.limit.unwrap_or(usize::MAX);
            c.users
                .values()
                .filter(|user| query.matches(user))
                .take(limit)
                .cloned()
                .collect()
        })
    }

    fn update_user_location<'a>(
        &'a self,
        user_id: &'a str,
        location: Location,
        address: Option<Address>,
    ) -> BoxFuture<'a, bool, DbError> {
        self.run(|c| match c.users.get_mut(user_id) {
            Some(user) => {
                user.location_updated_at = Some(location.timestamp);
                user.location = Some(location);
                user.address = address;
                true
            }
            None => false,
        })
    }

    fn create_match<'a>(
        &'a self,
        user_a: &'a str,
        user_b: &'a str,
        created_at: DateTime<Utc>,
    ) -> BoxFuture<'a, MatchWrite, DbError> {
        self.run(|c| {
            for user_id in [user_a, user_b] {
                if !c.users.contains_key(user_id) {
                    return MatchWrite::UserMissing(user_id.to_string());
                }
            }

            let record = MatchRecord::new(user_a, user_b, created_at);
            let outcome = match c.matches.get(&record.id) {
                Some(existing) => MatchWrite::AlreadyExists(existing.clone()),
                None => {
                    c.matches.insert(record.id.clone(), record.clone());
                    MatchWrite::Created(record)
                }
            };

            for (owner, other) in [(user_a, user_b), (user_b, user_a)] {
                if let Some(user) = c.users.get_mut(owner) {
                    user.matches.insert(other.to_string());
                }
            }
            debug!("Match transaction applied for {} and {}", user_a, user_b);
            outcome
        })
    }

    fn get_match<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, Option<MatchRecord>, DbError> {
        self.run(|c| c.matches.get(match_id).cloned())
    }

    fn find_matches_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Vec<MatchRecord>, DbError> {
        self.run(|c| {
            c.matches
                .values()
                .filter(|record| record.involves(user_id))
                .cloned()
                .collect()
        })
    }

    fn insert_message(&self, message: MessageRecord) -> BoxFuture<'_, (), DbError> {
        self.run(|c| {
            c.messages
                .entry(message.match_id.clone())
                .or_default()
                .push(message);
        })
    }

    fn count_messages<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, u64, DbError> {
        self.run(|c| c.messages.get(match_id).map_or(0, |m| m.len() as u64))
    }

    fn insert_notification(&self, notification: NotificationRecord) -> BoxFuture<'_, (), DbError> {
        self.run(|c| c.notifications.push(notification))
    }

    fn list_notifications<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Vec<NotificationRecord>, DbError> {
        self.run(|c| {
            let mut found: Vec<_> = c
                .notifications
                .iter()
                .filter(|n| n.user_id == user_id)
                .cloned()
                .collect();
            found.sort_by_key(|n| n.created_at);
            found
        })
    }

    fn count_unread_notifications<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, u64, DbError> {
        self.run(|c| {
            c.notifications
                .iter()
                .filter(|n| n.user_id == user_id && !n.is_read)
                .count() as u64
        })
    }

    fn delete_notifications_before(&self, threshold: DateTime<Utc>) -> BoxFuture<'_, u64, DbError> {
        self.run(|c| {
            let before = c.notifications.len();
            c.notifications.retain(|n| n.created_at >= threshold);
            (before - c.notifications.len()) as u64
        })
    }

    fn is_healthy(&self) -> BoxFuture<'_, bool, DbError> {
        self.run(|_| true)
    }
}
