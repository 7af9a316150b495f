//! Order number generation.
//!
//! The order number is the partition routing key, so it is fixed once an
//! order is created.

use std::sync::atomic::{AtomicI64, Ordering};

use common::OrderNumber;

/// Source of order numbers for new orders.
pub trait OrderNumberGenerator: Send + Sync {
    /// Returns a fresh order number.
    fn next_number(&self) -> OrderNumber;
}

/// Draws 63 random bits per order number.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOrderNumbers;

impl OrderNumberGenerator for RandomOrderNumbers {
    fn next_number(&self) -> OrderNumber {
        OrderNumber::random()
    }
}

/// Hands out consecutive numbers, for tests that need predictable routing.
#[derive(Debug, Default)]
pub struct SequentialOrderNumbers {
    next: AtomicI64,
}

impl SequentialOrderNumbers {
    /// Starts the sequence at `first`.
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl OrderNumberGenerator for SequentialOrderNumbers {
    fn next_number(&self) -> OrderNumber {
        OrderNumber::new(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_numbers_differ() {
        let generator: Box<dyn OrderNumberGenerator> = Box::new(RandomOrderNumbers);
        assert_ne!(generator.next_number(), generator.next_number());
    }

    #[test]
    fn test_sequential_numbers() {
        let generator = SequentialOrderNumbers::starting_at(1000);
        assert_eq!(generator.next_number(), OrderNumber::new(1000));
        assert_eq!(generator.next_number(), OrderNumber::new(1001));
    }
}
