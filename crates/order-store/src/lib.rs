//! Partition-routed, transactional persistence for orders.
//!
//! An order header lives in the `orders` table and its line items in
//! `product_requests`; both always live in the same partition, selected by
//! [`PartitionRouter`] from the order number.

pub mod error;
pub mod memory;
pub mod partition;
pub mod postgres;
pub mod store;

pub use common::{OrderId, OrderNumber};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use partition::PartitionRouter;
pub use postgres::PostgresOrderStore;
pub use store::OrderStore;
