use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use domain::{LineItem, Order, OrderStatus};
use tokio::sync::RwLock;

use crate::{OrderId, OrderStore, PartitionRouter, Result, StoreError};

/// Rows of one partition: order headers and their line items, kept apart the
/// same way the `orders` and `product_requests` tables are.
#[derive(Debug, Default)]
struct Partition {
    headers: BTreeMap<OrderId, Order>,
    line_items: BTreeMap<OrderId, Vec<LineItem>>,
    last_sequence: i64,
    commits: u64,
}

impl Partition {
    fn assemble(&self, id: OrderId) -> Option<Order> {
        let mut order = self.headers.get(&id)?.clone();
        order.line_items = self.line_items.get(&id).cloned().unwrap_or_default();
        Some(order)
    }
}

/// In-memory order store for testing and local runs.
///
/// Partitions are independent maps behind their own lock; a write holds its
/// partition's lock for the whole operation, so readers never observe a header
/// without its line items. Failures can be injected to exercise rollback paths.
#[derive(Clone)]
pub struct InMemoryOrderStore {
    router: PartitionRouter,
    partitions: Arc<Vec<RwLock<Partition>>>,
    fail_line_item_writes: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates an empty store with one map per partition.
    pub fn new(router: PartitionRouter) -> Self {
        let partitions = (0..router.partition_count())
            .map(|_| RwLock::new(Partition::default()))
            .collect();
        Self {
            router,
            partitions: Arc::new(partitions),
            fail_line_item_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every subsequent line-item write fail after the header write,
    /// forcing the surrounding transaction to roll back.
    pub fn set_fail_line_item_writes(&self, fail: bool) {
        self.fail_line_item_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of order headers across partitions.
    pub async fn order_count(&self) -> usize {
        let mut count = 0;
        for partition in self.partitions.iter() {
            count += partition.read().await.headers.len();
        }
        count
    }

    /// Returns the total number of line-item rows across partitions.
    pub async fn line_item_count(&self) -> usize {
        let mut count = 0;
        for partition in self.partitions.iter() {
            count += partition
                .read()
                .await
                .line_items
                .values()
                .map(Vec::len)
                .sum::<usize>();
        }
        count
    }

    /// Returns the number of committed writes per partition.
    pub async fn commit_counts(&self) -> Vec<u64> {
        let mut counts = Vec::with_capacity(self.partitions.len());
        for partition in self.partitions.iter() {
            counts.push(partition.read().await.commits);
        }
        counts
    }

    /// Returns the partition that holds the header for `id`, if any.
    pub async fn partition_of(&self, id: OrderId) -> Option<usize> {
        for (index, partition) in self.partitions.iter().enumerate() {
            if partition.read().await.headers.contains_key(&id) {
                return Some(index);
            }
        }
        None
    }

    fn partition(&self, index: usize) -> Result<&RwLock<Partition>> {
        self.partitions
            .get(index)
            .ok_or(StoreError::PartitionMissing {
                partition: index,
                configured: self.partitions.len(),
            })
    }

    fn check_line_item_write(&self) -> Result<()> {
        if self.fail_line_item_writes.load(Ordering::SeqCst) {
            return Err(StoreError::InjectedFailure(
                "line item write failed".to_string(),
            ));
        }
        Ok(())
    }
}

fn split(mut order: Order) -> (Order, Vec<LineItem>) {
    let items = std::mem::take(&mut order.line_items);
    (order, items)
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order) -> Result<Order> {
        let index = self.router.partition_for_number(order.order_number);
        let mut partition = self.partition(index)?.write().await;

        // Identifiers are consumed even when the write rolls back, like a
        // database sequence.
        partition.last_sequence += 1;
        let id = self.router.identifier(index, partition.last_sequence);

        let now = Utc::now();
        let (mut header, items) = split(order);
        header.id = id;
        header.created_at = Some(now);
        header.updated_at = Some(now);

        self.check_line_item_write()?;

        partition.headers.insert(id, header);
        partition.line_items.insert(id, items);
        partition.commits += 1;

        tracing::debug!(%id, partition = index, "order created");
        partition
            .assemble(id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, order: Order) -> Result<Order> {
        let index = self.router.partition_for_number(order.order_number);
        let mut partition = self.partition(index)?.write().await;

        let id = order.id;
        let created_at = partition
            .headers
            .get(&id)
            .ok_or(StoreError::NotFound(id))?
            .created_at;

        let (mut header, items) = split(order);
        header.created_at = created_at;
        header.updated_at = Some(Utc::now());

        self.check_line_item_write()?;

        partition.headers.insert(id, header);
        partition.line_items.insert(id, items);
        partition.commits += 1;

        tracing::debug!(%id, partition = index, "order updated");
        partition
            .assemble(id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        let index = self.router.partition_for_id(id);
        let partition = self.partition(index)?.read().await;
        partition.assemble(id).ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, id: OrderId) -> Result<()> {
        let index = self.router.partition_for_id(id);
        let mut partition = self.partition(index)?.write().await;

        if !partition.headers.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        partition.line_items.remove(&id);
        partition.headers.remove(&id);
        partition.commits += 1;

        tracing::debug!(%id, partition = index, "order deleted");
        Ok(())
    }

    async fn update_status(&self, id: OrderId, status: &OrderStatus) -> Result<()> {
        let index = self.router.partition_for_id(id);
        let mut partition = self.partition(index)?.write().await;

        let header = partition
            .headers
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        header.status = status.clone();
        header.updated_at = Some(Utc::now());
        partition.commits += 1;
        Ok(())
    }
}
