use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw integer value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

integer_id! {
    /// Storage identifier of an order, assigned by the order store on creation.
    ///
    /// Identifiers are allocated so that they fall in the same partition as the
    /// order number they were created for.
    OrderId
}

integer_id! {
    /// Externally visible order number, assigned before persistence and used as
    /// the partition routing key.
    OrderNumber
}

integer_id! {
    /// Product identifier as understood by the inventory and pricing services.
    ProductId
}

integer_id! {
    /// Identifier of the user that owns an order.
    UserId
}

impl OrderNumber {
    /// Generates a random non-negative order number.
    ///
    /// Takes 63 bits from a v4 UUID, which keeps collisions negligible without
    /// a uniqueness lookup against existing orders.
    pub fn random() -> Self {
        let bits = Uuid::new_v4().as_u64_pair().0;
        Self((bits >> 1) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_order_numbers_are_non_negative_and_distinct() {
        let a = OrderNumber::random();
        let b = OrderNumber::random();
        assert!(a.as_i64() >= 0);
        assert!(b.as_i64() >= 0);
        assert_ne!(a, b);
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        let id = OrderId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let product: ProductId = serde_json::from_str("7").unwrap();
        assert_eq!(product, ProductId::new(7));
    }

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(UserId::new(-3).to_string(), "-3");
        assert_eq!(i64::from(OrderNumber::new(1001)), 1001);
    }
}
