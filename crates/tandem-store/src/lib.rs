//! Tandem Store - Local state persistence
//!
//! SQLite-based store for:
//! - Stalled issues and their resolution outcomes
//! - Per-root, per-side sync baselines
//! - The debris index
//!
//! ## Architecture
//!
//! This crate implements the `IStateRepository` port from `tandem-core`
//! using SQLite as the storage backend. It is a driven (secondary)
//! adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`SqliteStateRepository`] - Full `IStateRepository` implementation,
//!   owning its connection pool and schema setup
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use tandem_store::SqliteStateRepository;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo =
//!     SqliteStateRepository::open(Path::new("/home/user/.local/share/tandem/state.db")).await?;
//! // Use repo as IStateRepository...
//! # Ok(())
//! # }
//! ```

pub mod repository;

pub use repository::SqliteStateRepository;

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

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
