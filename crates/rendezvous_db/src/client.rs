//! Database client for Rendezvous
//!
//! A thin wrapper around an `sqlx::Any` pool so the SQL store stays agnostic
//! of the concrete database behind the URL.

use crate::error::DbError;
use rendezvous_config::DatabaseConfig;
use sqlx::pool::PoolOptions;
use sqlx::{Pool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database transaction
pub type DbTransaction<'a> = Transaction<'a, sqlx::Any>;

/// Database client for Rendezvous
#[derive(Debug, Clone)]
pub struct DbClient {
    pool: Pool<sqlx::Any>,
}

impl DbClient {
    /// Create a new database client from a database configuration
    ///
    /// # Errors
    ///
    /// Fails when the URL is empty or the pool cannot connect.
    pub async fn from_config(db_config: &DatabaseConfig) -> Result<Self, DbError> {
        if db_config.url.is_empty() {
            return Err(DbError::ConfigError("Database URL is empty".to_string()));
        }

        let pool = Self::create_pool(&db_config.url, db_config.max_connections).await?;
        Ok(Self { pool })
    }

    async fn create_pool(db_url: &str, max_connections: u32) -> Result<Pool<sqlx::Any>, DbError> {
        debug!("Opening pool for {}", db_url);

        sqlx::any::install_default_drivers();

        let in_memory = db_url.contains(":memory:");

        // Each connection to an in-memory SQLite database sees its own empty
        // database, so those pools are pinned to one long-lived connection.
        let pool_options = if in_memory {
            PoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            PoolOptions::new()
                .max_connections(max_connections.max(1))
                .idle_timeout(Duration::from_secs(600))
        }
        .acquire_timeout(Duration::from_secs(3));

        if db_url.starts_with("sqlite:") && !in_memory {
            Self::ensure_sqlite_file(db_url)?;
        }

        let options = sqlx::any::AnyConnectOptions::from_str(db_url)
            .map_err(|e| DbError::UrlError(e.to_string()))?;
        let pool = pool_options.connect_with(options).await.map_err(|e| {
            error!("Failed to create database pool: {}", e);
            DbError::PoolError(e.to_string())
        })?;

        info!("Database pool ready ({} max connections)", pool.options().get_max_connections());
        Ok(pool)
    }

    // AnyConnectOptions cannot set create_if_missing, so the file is created up front.
    fn ensure_sqlite_file(db_url: &str) -> Result<(), DbError> {
        let db_path = db_url
            .strip_prefix("sqlite://")
            .or_else(|| db_url.strip_prefix("sqlite:"))
            .unwrap_or(db_url);
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if db_path.is_empty() {
            return Ok(());
        }

        let path = std::path::Path::new(db_path);
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                debug!("Creating SQLite directory {}", dir.display());
                std::fs::create_dir_all(dir).map_err(|e| {
                    error!("Cannot create {}: {}", dir.display(), e);
                    DbError::PoolError(format!("cannot create {}: {}", dir.display(), e))
                })?;
            }
        }

        if !path.exists() {
            debug!("Creating SQLite file {}", db_path);
            std::fs::File::create(path).map_err(|e| {
                error!("Cannot create {}: {}", db_path, e);
                DbError::PoolError(format!("cannot create {}: {}", db_path, e))
            })?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &Pool<sqlx::Any> {
        &self.pool
    }

    /// Begin a transaction
    pub async fn begin(&self) -> Result<DbTransaction<'static>, DbError> {
        Ok(self.pool.begin().await?)
    }

    /// Execute a statement that returns no rows, yielding the affected row count
    pub async fn execute(&self, query: &str) -> Result<u64, DbError> {
        Ok(sqlx::query(query)
            .execute(&self.pool)
            .await?
            .rows_affected())
    }

    /// Check if the database is healthy
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
