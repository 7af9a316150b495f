use thiserror::Error;

use crate::OrderId;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order header exists for the identifier.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The router was configured with zero partitions.
    #[error("Invalid partition count: {0} (must be at least 1)")]
    InvalidPartitionCount(usize),

    /// The router selected a partition with no backing connection.
    #[error("Partition {partition} is not configured ({configured} partitions available)")]
    PartitionMissing { partition: usize, configured: usize },

    /// A failure injected into the in-memory store.
    #[error("Injected storage failure: {0}")]
    InjectedFailure(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
