use async_trait::async_trait;
use domain::{Order, OrderStatus};

use crate::{OrderId, Result};

/// Core trait for order store implementations.
///
/// Every operation resolves a single partition and runs against it; an order's
/// header and line items never span partitions. Multi-step writes are atomic:
/// on any failure nothing of the attempt is visible. No operation retries.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the header and all line items, returning the order with its
    /// generated identifier and timestamps.
    ///
    /// The partition is selected from `order.order_number`.
    async fn create(&self, order: Order) -> Result<Order>;

    /// Rewrites the header and replaces all line items of an existing order.
    ///
    /// Fails with `NotFound` if no header exists for `order.id`.
    async fn update(&self, order: Order) -> Result<Order>;

    /// Reads the header and its line items, in their stored order.
    async fn get_by_id(&self, id: OrderId) -> Result<Order>;

    /// Deletes line items then header.
    async fn delete(&self, id: OrderId) -> Result<()>;

    /// Changes only the status column, in a single statement.
    async fn update_status(&self, id: OrderId, status: &OrderStatus) -> Result<()>;
}
