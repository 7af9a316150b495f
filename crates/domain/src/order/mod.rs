//! Order aggregate and related types.

mod aggregate;
mod status;
mod value_objects;

pub use aggregate::{LineItem, Order};
pub use status::OrderStatus;
pub use value_objects::{Money, UnitPricing};
