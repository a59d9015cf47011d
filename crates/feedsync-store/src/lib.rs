//! FeedSync Store - Local reading-state persistence
//!
//! SQLite-based store for:
//! - Feeds, groups and their ordered feed references
//! - Posts with read/bookmark flags
//! - Blocked words
//! - Per-service user records and OAuth tokens
//! - Sync settings
//!
//! ## Architecture
//!
//! This crate implements the `IRssRepository`, `IUserRepository` and
//! `ISettingsRepository` ports from `feedsync-core` using SQLite as the
//! storage backend. It is a driven (secondary) adapter in the hexagonal
//! architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteStore`] - Implementation of the three repository ports
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use feedsync_store::{DatabasePool, SqliteStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/feedsync/feedsync.db")).await?;
//! let store = SqliteStore::new(pool.pool().clone()).await?;
//! // Use store as IRssRepository / IUserRepository / ISettingsRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped to a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
