//! Order status.

use serde::{Deserialize, Serialize};

/// The status of an order.
///
/// The set is open: statuses this service does not act on are carried through
/// verbatim so that other writers of the `orders` table are not clobbered.
///
/// ```text
/// created ──► paid ──► cancelled
///    └───────────────────▲
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Order has been accepted and priced.
    #[default]
    Created,

    /// Order has been paid; stock is re-validated before this is stored.
    Paid,

    /// Order was cancelled.
    Cancelled,

    /// Any other status string.
    Other(String),
}

impl OrderStatus {
    /// Returns the status as its wire string.
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Other(s) => s,
        }
    }

    /// The empty status carried by requests that do not name one.
    pub fn unset() -> Self {
        OrderStatus::Other(String::new())
    }

    /// Returns true if the status string is empty.
    pub fn is_unset(&self) -> bool {
        self.as_str().is_empty()
    }

    /// Returns true if moving an order into this status requires its items to
    /// be in stock.
    pub fn requires_stock_check(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => OrderStatus::Created,
            "paid" => OrderStatus::Paid,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Other(s),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        OrderStatus::from(s.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
