//! Document store for Rendezvous
//!
//! The orchestration services only see the [`DocumentStore`] trait. Two
//! implementations are provided:
//!
//! - [`SqlDocumentStore`]: tables over an `sqlx::Any` pool (SQLite by default)
//! - [`MemoryDocumentStore`]: an in-process store for development and tests
//!
//! [`StoreFactory`] picks one from the `database` configuration section.
//!
//! # Example
//!
//! ```rust,no_run
//! use rendezvous_config::AppConfig;
//! use rendezvous_db::StoreFactory;
//!
//! async fn setup() -> Result<(), rendezvous_db::DbError> {
//!     let store = StoreFactory::new().from_app_config(&AppConfig::default()).await?;
//!     assert!(store.is_healthy().await?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod factory;
pub mod memory;
pub mod sql;
pub mod store;

pub use client::DbClient;
pub use error::DbError;
pub use factory::{StoreFactory, MEMORY_URL};
pub use memory::MemoryDocumentStore;
pub use sql::SqlDocumentStore;
pub use store::{DocumentStore, MatchWrite, UserQuery};
