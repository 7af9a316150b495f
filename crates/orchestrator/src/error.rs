//! Orchestrator error types.

use std::time::Duration;

use common::{OrderId, ProductId};
use domain::MoneyError;
use order_store::StoreError;
use thiserror::Error;

/// Errors raised by a single inventory or pricing call.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The request could not be sent or the connection failed.
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The collaborator answered with a non-success status.
    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },

    /// The response body did not match the expected shape.
    #[error("{service} response could not be decoded: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The call did not complete within the collaborator timeout.
    #[error("{service} call timed out after {timeout:?}")]
    Timeout {
        service: &'static str,
        timeout: Duration,
    },

    /// The collaborator reported itself unavailable.
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },

    /// The task running the call panicked or was aborted.
    #[error("Collaborator task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised by the idempotency cache.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The cache could not be reached or rejected the command.
    #[error("Idempotency cache unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for IdempotencyError {
    fn from(err: redis::RedisError) -> Self {
        IdempotencyError::Unavailable(err.to_string())
    }
}

/// Errors raised while publishing change events.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The order could not be serialized.
    #[error("Failed to serialize order event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink did not acknowledge the event.
    #[error("Failed to deliver event {key}: {reason}")]
    Delivery { key: String, reason: String },

    /// The producer could not be created.
    #[error("Invalid event producer configuration: {0}")]
    Config(String),
}

/// Outcome taxonomy of the order workflows.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request was rejected before any side effect.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The idempotency token was already used.
    #[error("Duplicate submission for idempotency key '{0}'")]
    DuplicateSubmission(String),

    /// An inventory or pricing call failed.
    #[error("Collaborator call for product {product_id} failed: {source}")]
    CollaboratorUnavailable {
        product_id: ProductId,
        #[source]
        source: CollaboratorError,
    },

    /// Scaling a unit price by the line quantity overflowed.
    #[error("Amounts for product {product_id} could not be computed: {source}")]
    LineAmount {
        product_id: ProductId,
        #[source]
        source: MoneyError,
    },

    /// Summing line amounts into order totals overflowed.
    #[error("Order totals could not be computed: {0}")]
    TotalAmount(#[from] MoneyError),

    /// Inventory reported insufficient stock.
    #[error("Product {product_id} is out of stock")]
    OutOfStock { product_id: ProductId },

    /// The idempotency cache could not be consulted.
    #[error(transparent)]
    IdempotencyUnavailable(#[from] IdempotencyError),

    /// No order exists with the identifier.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),

    /// The change event could not be published.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            other => OrderError::Persistence(other),
        }
    }
}

impl OrderError {
    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::InvalidRequest(_) => "invalid_request",
            OrderError::DuplicateSubmission(_) => "duplicate",
            OrderError::CollaboratorUnavailable { .. } => "collaborator_unavailable",
            OrderError::LineAmount { .. } | OrderError::TotalAmount(_) => "amount_overflow",
            OrderError::OutOfStock { .. } => "out_of_stock",
            OrderError::IdempotencyUnavailable(_) => "idempotency_unavailable",
            OrderError::NotFound(_) => "not_found",
            OrderError::Persistence(_) => "persistence",
            OrderError::Publish(_) => "publish",
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrderError>;
