//! SQL implementation of the document store
//!
//! Collections map onto tables: `users` (plus the `user_matches` join table
//! holding each user's match set), `matches`, `messages` and `notifications`.
//! Timestamps are stored as fixed-width RFC 3339 UTC text so that string
//! comparison orders them chronologically, and only integer, real and text
//! columns are used because `sqlx::Any` decodes nothing else.

use chrono::{DateTime, SecondsFormat, Utc};
use rendezvous_common::models::{
    Address, Location, MatchRecord, MatchStatus, MessageRecord, NotificationRecord,
    NotificationType, User,
};
use rendezvous_common::BoxFuture;
use sqlx::any::AnyRow;
use sqlx::Row;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::client::DbClient;
use crate::error::DbError;
use crate::store::{DocumentStore, MatchWrite, UserQuery};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        fcm_token TEXT,
        latitude REAL,
        longitude REAL,
        accuracy REAL,
        location_timestamp TEXT,
        address TEXT,
        age INTEGER,
        is_profile_complete INTEGER NOT NULL DEFAULT 0,
        last_activity TEXT,
        created_at TEXT,
        location_updated_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_matches (
        user_id TEXT NOT NULL,
        matched_user_id TEXT NOT NULL,
        PRIMARY KEY (user_id, matched_user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS matches (
        id TEXT PRIMARY KEY,
        user_a TEXT NOT NULL,
        user_b TEXT NOT NULL,
        created_at TEXT NOT NULL,
        status TEXT NOT NULL,
        last_message TEXT,
        last_message_time TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_matches_user_a ON matches (user_a)",
    "CREATE INDEX IF NOT EXISTS idx_matches_user_b ON matches (user_b)",
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        match_id TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        text TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_match ON messages (match_id)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        type TEXT NOT NULL,
        related_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, is_read)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_created ON notifications (created_at)",
];

const USER_COLUMNS: &str = "users.id, users.fcm_token, users.latitude, users.longitude, \
    users.accuracy, users.location_timestamp, users.address, users.age, \
    users.is_profile_complete, users.last_activity, users.created_at, users.location_updated_at";

// Parameters: $1 require location (0/1), $2 profile complete, $3 min age, $4 max age
const USER_FILTER: &str = "($1 = 0 OR (users.latitude IS NOT NULL AND users.longitude IS NOT NULL \
    AND users.location_timestamp IS NOT NULL)) \
    AND ($2 IS NULL OR users.is_profile_complete = $2) \
    AND ($3 IS NULL OR users.age >= $3) \
    AND ($4 IS NULL OR users.age <= $4)";

const MATCH_COLUMNS: &str = "id, user_a, user_b, created_at, status, last_message, last_message_time";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, type, related_id, created_at, is_read";

/// SQL implementation of the document store
#[derive(Debug, Clone)]
pub struct SqlDocumentStore {
    db_client: DbClient,
}

impl SqlDocumentStore {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    /// Creates the tables and indexes if they don't already exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing document store schema");
        for statement in SCHEMA {
            self.db_client.execute(statement).await?;
        }
        info!("Document store schema initialized successfully");
        Ok(())
    }

    async fn load_match_set(&self, user_id: &str) -> Result<BTreeSet<String>, DbError> {
        let rows = sqlx::query("SELECT matched_user_id FROM user_matches WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(self.db_client.pool())
            .await?;
        rows.iter()
            .map(|row| row.try_get("matched_user_id").map_err(DbError::from))
            .collect()
    }
}

fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(column: &'static str, raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::Decode {
            column,
            message: e.to_string(),
        })
}

fn decode_opt_ts(row: &AnyRow, column: &'static str) -> Result<Option<DateTime<Utc>>, DbError> {
    row.try_get::<Option<String>, _>(column)?
        .map(|raw| decode_ts(column, &raw))
        .transpose()
}

fn user_from_row(row: &AnyRow, matches: BTreeSet<String>) -> Result<User, DbError> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let location = match (latitude, longitude, decode_opt_ts(row, "location_timestamp")?) {
        (Some(latitude), Some(longitude), Some(timestamp)) => Some(Location {
            latitude,
            longitude,
            accuracy: row.try_get::<Option<f64>, _>("accuracy")?.unwrap_or_default(),
            timestamp,
        }),
        _ => None,
    };

    let address = row
        .try_get::<Option<String>, _>("address")?
        .map(|raw| serde_json::from_str::<Address>(&raw))
        .transpose()?;

    let age = row
        .try_get::<Option<i64>, _>("age")?
        .map(u32::try_from)
        .transpose()
        .map_err(|e| DbError::Decode {
            column: "age",
            message: e.to_string(),
        })?;

    Ok(User {
        id: row.try_get("id")?,
        fcm_token: row.try_get("fcm_token")?,
        location,
        address,
        age,
        is_profile_complete: row.try_get::<i64, _>("is_profile_complete")? != 0,
        matches,
        last_activity: decode_opt_ts(row, "last_activity")?,
        created_at: decode_opt_ts(row, "created_at")?,
        location_updated_at: decode_opt_ts(row, "location_updated_at")?,
    })
}

fn match_from_row(row: &AnyRow) -> Result<MatchRecord, DbError> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(MatchRecord {
        id: row.try_get("id")?,
        users: [row.try_get("user_a")?, row.try_get("user_b")?],
        created_at: decode_ts("created_at", &created_at)?,
        status: status.parse::<MatchStatus>().map_err(|message| DbError::Decode {
            column: "status",
            message,
        })?,
        last_message: row.try_get("last_message")?,
        last_message_time: decode_opt_ts(row, "last_message_time")?,
    })
}

fn notification_from_row(row: &AnyRow) -> Result<NotificationRecord, DbError> {
    let kind: String = row.try_get("type")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(NotificationRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        kind: kind
            .parse::<NotificationType>()
            .map_err(|message| DbError::Decode {
                column: "type",
                message,
            })?,
        related_id: row.try_get("related_id")?,
        created_at: decode_ts("created_at", &created_at)?,
        is_read: row.try_get::<i64, _>("is_read")? != 0,
    })
}

impl DocumentStore for SqlDocumentStore {
    fn get_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Option<User>, DbError> {
        Box::pin(async move {
            let query = format!("SELECT {} FROM users WHERE users.id = $1", USER_COLUMNS);
            let row = sqlx::query(&query)
                .bind(user_id)
                .fetch_optional(self.db_client.pool())
                .await?;

            match row {
                Some(row) => {
                    let matches = self.load_match_set(user_id).await?;
                    Ok(Some(user_from_row(&row, matches)?))
                }
                None => Ok(None),
            }
        })
    }

    fn upsert_user(&self, user: User) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            debug!("Upserting user: {}", user.id);
            let address = user.address.as_ref().map(serde_json::to_string).transpose()?;
            let location = user.location.as_ref();

            let mut tx = self.db_client.begin().await?;
            sqlx::query(
                r#"
                INSERT INTO users (id, fcm_token, latitude, longitude, accuracy, location_timestamp,
                                   address, age, is_profile_complete, last_activity, created_at,
                                   location_updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (id) DO UPDATE SET
                    fcm_token = excluded.fcm_token,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    accuracy = excluded.accuracy,
                    location_timestamp = excluded.location_timestamp,
                    address = excluded.address,
                    age = excluded.age,
                    is_profile_complete = excluded.is_profile_complete,
                    last_activity = excluded.last_activity,
                    created_at = excluded.created_at,
                    location_updated_at = excluded.location_updated_at
                "#,
            )
            .bind(user.id.as_str())
            .bind(user.fcm_token.clone())
            .bind(location.map(|l| l.latitude))
            .bind(location.map(|l| l.longitude))
            .bind(location.map(|l| l.accuracy))
            .bind(location.map(|l| encode_ts(&l.timestamp)))
            .bind(address)
            .bind(user.age.map(i64::from))
            .bind(i64::from(user.is_profile_complete))
            .bind(user.last_activity.as_ref().map(encode_ts))
            .bind(user.created_at.as_ref().map(encode_ts))
            .bind(user.location_updated_at.as_ref().map(encode_ts))
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM user_matches WHERE user_id = $1")
                .bind(user.id.as_str())
                .execute(&mut *tx)
                .await?;
            for matched in &user.matches {
                sqlx::query("INSERT INTO user_matches (user_id, matched_user_id) VALUES ($1, $2)")
                    .bind(user.id.as_str())
                    .bind(matched.as_str())
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(())
        })
    }

    fn query_users(&self, query: UserQuery) -> BoxFuture<'_, Vec<User>, DbError> {
        Box::pin(async move {
            let require_location = i64::from(query.require_location);
            let profile_complete = query.profile_complete.map(i64::from);
            let min_age = query.min_age.map(i64::from);
            let max_age = query.max_age.map(i64::from);
            // SQLite treats a negative LIMIT as unbounded
            let limit = query.limit.map_or(-1, |l| l as i64);

            let select = format!(
                "SELECT {} FROM users WHERE {} ORDER BY users.id LIMIT $5",
                USER_COLUMNS, USER_FILTER
            );
            let rows = sqlx::query(&select)
                .bind(require_location)
                .bind(profile_complete)
                .bind(min_age)
                .bind(max_age)
                .bind(limit)
                .fetch_all(self.db_client.pool())
                .await?;

            let match_select = format!(
                "SELECT um.user_id, um.matched_user_id FROM user_matches um \
                 JOIN users ON users.id = um.user_id WHERE {}",
                USER_FILTER
            );
            let match_rows = sqlx::query(&match_select)
                .bind(require_location)
                .bind(profile_complete)
                .bind(min_age)
                .bind(max_age)
                .fetch_all(self.db_client.pool())
                .await?;

            let mut match_sets: HashMap<String, BTreeSet<String>> = HashMap::new();
            for row in &match_rows {
                match_sets
                    .entry(row.try_get("user_id")?)
                    .or_default()
                    .insert(row.try_get("matched_user_id")?);
            }

            debug!("User query returned {} rows", rows.len());
            rows.iter()
                .map(|row| {
                    let id: String = row.try_get("id")?;
                    user_from_row(row, match_sets.remove(&id).unwrap_or_default())
                })
                .collect()
        })
    }

    fn update_user_location<'a>(
        &'a self,
        user_id: &'a str,
        location: Location,
        address: Option<Address>,
    ) -> BoxFuture<'a, bool, DbError> {
        Box::pin(async move {
            let address = address.as_ref().map(serde_json::to_string).transpose()?;
            let timestamp = encode_ts(&location.timestamp);
            let result = sqlx::query(
                r#"
                UPDATE users
                SET latitude = $1, longitude = $2, accuracy = $3, location_timestamp = $4,
                    address = $5, location_updated_at = $4
                WHERE id = $6
                "#,
            )
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(location.accuracy)
            .bind(timestamp)
            .bind(address)
            .bind(user_id)
            .execute(self.db_client.pool())
            .await?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn create_match<'a>(
        &'a self,
        user_a: &'a str,
        user_b: &'a str,
        created_at: DateTime<Utc>,
    ) -> BoxFuture<'a, MatchWrite, DbError> {
        Box::pin(async move {
            let mut tx = self.db_client.begin().await?;

            for user_id in [user_a, user_b] {
                let exists = sqlx::query("SELECT id FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                if exists.is_none() {
                    tx.rollback().await?;
                    return Ok(MatchWrite::UserMissing(user_id.to_string()));
                }
            }

            let record = MatchRecord::new(user_a, user_b, created_at);
            let inserted = sqlx::query(
                r#"
                INSERT INTO matches (id, user_a, user_b, created_at, status, last_message, last_message_time)
                VALUES ($1, $2, $3, $4, $5, NULL, NULL)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(record.id.as_str())
            .bind(record.users[0].as_str())
            .bind(record.users[1].as_str())
            .bind(encode_ts(&record.created_at))
            .bind(record.status.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            for (owner, other) in [(user_a, user_b), (user_b, user_a)] {
                sqlx::query(
                    "INSERT INTO user_matches (user_id, matched_user_id) VALUES ($1, $2) \
                     ON CONFLICT (user_id, matched_user_id) DO NOTHING",
                )
                .bind(owner)
                .bind(other)
                .execute(&mut *tx)
                .await?;
            }

            let outcome = if inserted > 0 {
                MatchWrite::Created(record)
            } else {
                let select = format!("SELECT {} FROM matches WHERE id = $1", MATCH_COLUMNS);
                let row = sqlx::query(&select)
                    .bind(record.id.as_str())
                    .fetch_one(&mut *tx)
                    .await?;
                MatchWrite::AlreadyExists(match_from_row(&row)?)
            };

            tx.commit().await?;
            debug!("Match transaction committed for {} and {}", user_a, user_b);
            Ok(outcome)
        })
    }

    fn get_match<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, Option<MatchRecord>, DbError> {
        Box::pin(async move {
            let select = format!("SELECT {} FROM matches WHERE id = $1", MATCH_COLUMNS);
            sqlx::query(&select)
                .bind(match_id)
                .fetch_optional(self.db_client.pool())
                .await?
                .as_ref()
                .map(match_from_row)
                .transpose()
        })
    }

    fn find_matches_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Vec<MatchRecord>, DbError> {
        Box::pin(async move {
            let select = format!(
                "SELECT {} FROM matches WHERE user_a = $1 OR user_b = $1 ORDER BY id",
                MATCH_COLUMNS
            );
            let rows = sqlx::query(&select)
                .bind(user_id)
                .fetch_all(self.db_client.pool())
                .await?;
            rows.iter().map(match_from_row).collect()
        })
    }

    fn insert_message(&self, message: MessageRecord) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO messages (id, match_id, sender_id, text, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(message.id)
            .bind(message.match_id)
            .bind(message.sender_id)
            .bind(message.text)
            .bind(encode_ts(&message.created_at))
            .execute(self.db_client.pool())
            .await?;
            Ok(())
        })
    }

    fn count_messages<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, u64, DbError> {
        Box::pin(async move {
            let row = sqlx::query("SELECT COUNT(*) AS total FROM messages WHERE match_id = $1")
                .bind(match_id)
                .fetch_one(self.db_client.pool())
                .await?;
            Ok(row.try_get::<i64, _>("total")?.max(0) as u64)
        })
    }

    fn insert_notification(&self, notification: NotificationRecord) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO notifications (id, user_id, title, body, type, related_id, created_at, is_read)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(notification.id)
            .bind(notification.user_id)
            .bind(notification.title)
            .bind(notification.body)
            .bind(notification.kind.as_str())
            .bind(notification.related_id)
            .bind(encode_ts(&notification.created_at))
            .bind(i64::from(notification.is_read))
            .execute(self.db_client.pool())
            .await?;
            Ok(())
        })
    }

    fn list_notifications<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Vec<NotificationRecord>, DbError> {
        Box::pin(async move {
            let select = format!(
                "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at, id",
                NOTIFICATION_COLUMNS
            );
            let rows = sqlx::query(&select)
                .bind(user_id)
                .fetch_all(self.db_client.pool())
                .await?;
            rows.iter().map(notification_from_row).collect()
        })
    }

    fn count_unread_notifications<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, u64, DbError> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT COUNT(*) AS total FROM notifications WHERE user_id = $1 AND is_read = 0",
            )
            .bind(user_id)
            .fetch_one(self.db_client.pool())
            .await?;
            Ok(row.try_get::<i64, _>("total")?.max(0) as u64)
        })
    }

    fn delete_notifications_before(&self, threshold: DateTime<Utc>) -> BoxFuture<'_, u64, DbError> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM notifications WHERE created_at < $1")
                .bind(encode_ts(&threshold))
                .execute(self.db_client.pool())
                .await?;
            Ok(result.rows_affected())
        })
    }

    fn is_healthy(&self) -> BoxFuture<'_, bool, DbError> {
        Box::pin(async move { Ok(self.db_client.is_healthy().await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        let (a, b) = (encode_ts(&early), encode_ts(&late));

        assert_eq!(a, "2024-01-02T03:04:05.000000Z");
        assert!(a < b);
        assert_eq!(decode_ts("created_at", &b).unwrap(), late);
    }

    #[test]
    fn bad_timestamps_name_the_column() {
        let err = decode_ts("created_at", "yesterday").unwrap_err();
        assert!(err.to_string().starts_with("Corrupt created_at value"));
        assert!(!err.is_transient());
    }
}
