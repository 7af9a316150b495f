//! Domain layer for the order service.
//!
//! Holds the order aggregate as it is persisted and published, its line items,
//! the open-ended status enumeration and the money arithmetic used to derive
//! line totals from per-unit pricing.

pub mod error;
pub mod order;

pub use error::MoneyError;
pub use common::{OrderId, OrderNumber, ProductId, UserId};
pub use order::{LineItem, Money, Order, OrderStatus, UnitPricing};
