//! Error types for the document store

use rendezvous_common::{BoxedError, RendezvousError};
use thiserror::Error;

/// Errors that can occur when working with the document store
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// A stored value could not be decoded into a record
    #[error("Corrupt {column} value: {message}")]
    Decode { column: &'static str, message: String },

    /// Error encoding or decoding a JSON column
    #[error("Database serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The in-memory store is unavailable (poisoned lock or injected fault)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl DbError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Connection, pool and lock-contention failures are transient; malformed
    /// queries, constraint violations and corrupt data are not.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::SqlxError(err) => match err {
                sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::Tls(_) => true,
                sqlx::Error::Database(db) => {
                    let message = db.message().to_ascii_lowercase();
                    message.contains("database is locked") || message.contains("busy")
                }
                _ => false,
            },
            DbError::PoolError(_) | DbError::Unavailable(_) => true,
            _ => false,
        }
    }
}

impl From<DbError> for RendezvousError {
    fn from(err: DbError) -> Self {
        RendezvousError::Database {
            message: err.to_string(),
            transient: err.is_transient(),
            source: BoxedError(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_common::ErrorKind;

    #[test]
    fn pool_timeouts_are_transient() {
        assert!(DbError::SqlxError(sqlx::Error::PoolTimedOut).is_transient());
        assert!(DbError::Unavailable("injected".into()).is_transient());
        assert!(!DbError::SqlxError(sqlx::Error::RowNotFound).is_transient());
        assert!(!DbError::ConfigError("missing url".into()).is_transient());
    }

    #[test]
    fn converts_to_internal_with_source() {
        let err: RendezvousError = DbError::PoolError("closed".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "Database pool error: closed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
