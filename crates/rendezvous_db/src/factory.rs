//! Builds the configured [`DocumentStore`].

use crate::client::DbClient;
use crate::error::DbError;
use crate::memory::MemoryDocumentStore;
use crate::sql::SqlDocumentStore;
use crate::store::DocumentStore;
use rendezvous_config::{AppConfig, DatabaseConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// URL selecting the in-process store.
pub const MEMORY_URL: &str = "memory:";

/// Factory for document stores
#[derive(Debug, Clone, Default)]
pub struct StoreFactory;

impl StoreFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the store named by `config.database`, falling back to the
    /// in-memory store when no database is configured.
    pub async fn from_app_config(
        &self,
        config: &AppConfig,
    ) -> Result<Arc<dyn DocumentStore>, DbError> {
        match config.database.as_ref() {
            Some(db_config) => self.from_db_config(db_config).await,
            None => {
                warn!("No database configured, using the in-memory store");
                Ok(Arc::new(MemoryDocumentStore::new()))
            }
        }
    }

    /// Builds the store for one database configuration.
    ///
    /// SQL stores get their schema created before they are returned.
    pub async fn from_db_config(
        &self,
        db_config: &DatabaseConfig,
    ) -> Result<Arc<dyn DocumentStore>, DbError> {
        if db_config.url.trim() == MEMORY_URL {
            info!("Using in-memory document store");
            return Ok(Arc::new(MemoryDocumentStore::new()));
        }

        debug!("Creating SQL document store");
        let client = DbClient::from_config(db_config).await?;
        let store = SqlDocumentStore::new(client);
        store.init_schema().await?;
        Ok(Arc::new(store))
    }
}
