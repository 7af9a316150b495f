//! Deterministic mapping from order keys to storage partitions.

use crate::{OrderId, OrderNumber, Result, StoreError};

/// Maps an integer key to one of a fixed number of partitions.
///
/// `route(key) = key mod partition_count`, using Euclidean remainder so that
/// negative keys still land in `0..partition_count`. The partition count is
/// fixed for the lifetime of the router; changing it would move existing
/// orders and is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRouter {
    partition_count: usize,
}

impl PartitionRouter {
    /// Creates a router over `partition_count` partitions.
    pub fn new(partition_count: usize) -> Result<Self> {
        if partition_count == 0 {
            return Err(StoreError::InvalidPartitionCount(partition_count));
        }
        Ok(Self { partition_count })
    }

    /// Returns the number of partitions.
    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Returns the partition index for a key.
    pub fn route(&self, key: i64) -> usize {
        key.rem_euclid(self.partition_count as i64) as usize
    }

    /// Returns the partition holding the order with this number.
    pub fn partition_for_number(&self, number: OrderNumber) -> usize {
        self.route(number.as_i64())
    }

    /// Returns the partition holding the order with this identifier.
    ///
    /// Identifiers come from [`PartitionRouter::identifier`], so this agrees
    /// with [`PartitionRouter::partition_for_number`] for the order number the
    /// identifier was allocated under.
    pub fn partition_for_id(&self, id: OrderId) -> usize {
        self.route(id.as_i64())
    }

    /// Builds the identifier for the `sequence`-th order stored in `partition`.
    ///
    /// `sequence * partition_count + partition` keeps identifiers unique across
    /// partitions and congruent to the partition index.
    pub fn identifier(&self, partition: usize, sequence: i64) -> OrderId {
        OrderId::new(sequence * self.partition_count as i64 + partition as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_partitions_is_rejected() {
        assert!(matches!(
            PartitionRouter::new(0),
            Err(StoreError::InvalidPartitionCount(0))
        ));
    }

    #[test]
    fn test_route_is_modulo() {
        let router = PartitionRouter::new(3).unwrap();
        assert_eq!(router.route(0), 0);
        assert_eq!(router.route(1), 1);
        assert_eq!(router.route(5), 2);
        assert_eq!(router.route(1002), 0);
    }

    #[test]
    fn test_route_is_deterministic() {
        let router = PartitionRouter::new(7).unwrap();
        for key in [-50_i64, -1, 0, 13, 1_000_003, i64::MAX] {
            assert_eq!(router.route(key), router.route(key));
            assert_eq!(router.route(key), PartitionRouter::new(7).unwrap().route(key));
        }
    }

    #[test]
    fn test_route_is_onto_over_residue_cycle() {
        let router = PartitionRouter::new(5).unwrap();
        let mut seen: Vec<usize> = (100..105).map(|k| router.route(k)).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_negative_keys_stay_in_range() {
        let router = PartitionRouter::new(3).unwrap();
        assert_eq!(router.route(-1), 2);
        assert_eq!(router.route(i64::MIN), i64::MIN.rem_euclid(3) as usize);
    }

    #[test]
    fn test_single_partition_routes_everything_to_zero() {
        let router = PartitionRouter::new(1).unwrap();
        assert_eq!(router.route(12345), 0);
        assert_eq!(router.route(-9), 0);
    }

    #[test]
    fn test_identifiers_follow_their_order_number() {
        let router = PartitionRouter::new(3).unwrap();
        let number = OrderNumber::new(1_234_567);
        let partition = router.partition_for_number(number);

        for sequence in 1..10 {
            let id = router.identifier(partition, sequence);
            assert_eq!(router.partition_for_id(id), partition);
        }
        assert_ne!(router.identifier(0, 1), router.identifier(1, 1));
    }
}
