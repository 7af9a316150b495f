//! Inventory service trait with HTTP and in-memory implementations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use serde::Deserialize;

use super::{CallTracker, read, trim_base_url, write};
use crate::error::CollaboratorError;

const SERVICE: &str = "inventory";

/// Trait for stock availability checks.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Returns whether at least `quantity` units of the product are in stock.
    async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, CollaboratorError>;
}

#[derive(Debug, Deserialize)]
struct StockResponse {
    stock: i64,
}

/// Inventory client for `GET {base_url}/product/{id}/stock`.
#[derive(Debug, Clone)]
pub struct HttpInventoryService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryService {
    /// Creates a client against the inventory service at `base_url`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url),
        }
    }
}

#[async_trait]
impl InventoryService for HttpInventoryService {
    #[tracing::instrument(skip(self))]
    async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, CollaboratorError> {
        let url = format!("{}/product/{}/stock", self.base_url, product_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| CollaboratorError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body: StockResponse =
            response
                .json()
                .await
                .map_err(|source| CollaboratorError::Decode {
                    service: SERVICE,
                    source,
                })?;

        tracing::debug!(stock = body.stock, "stock received");
        Ok(body.stock >= i64::from(quantity))
    }
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<ProductId, i64>,
    failing: HashSet<ProductId>,
}

/// In-memory inventory service for testing.
///
/// Unknown products have no stock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
    latency: Duration,
    tracker: CallTracker,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Records calls on a shared tracker.
    pub fn with_tracker(mut self, tracker: CallTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Sets the stock level of a product.
    pub fn set_stock(&self, product_id: ProductId, stock: i64) {
        write(&self.state).stock.insert(product_id, stock);
    }

    /// Makes calls for a product fail with an unavailable error.
    pub fn set_failing(&self, product_id: ProductId, failing: bool) {
        let mut state = write(&self.state);
        if failing {
            state.failing.insert(product_id);
        } else {
            state.failing.remove(&product_id);
        }
    }

    /// Returns the call tracker.
    pub fn tracker(&self) -> &CallTracker {
        &self.tracker
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, CollaboratorError> {
        let _call = self.tracker.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let state = read(&self.state);
        if state.failing.contains(&product_id) {
            return Err(CollaboratorError::Unavailable {
                service: SERVICE,
                reason: format!("stock lookup failed for product {}", product_id),
            });
        }
        let stock = state.stock.get(&product_id).copied().unwrap_or(0);
        Ok(stock >= i64::from(quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_availability_compares_stock_with_quantity() {
        let service = InMemoryInventoryService::new();
        service.set_stock(ProductId::new(1), 3);

        assert!(service.check_availability(ProductId::new(1), 3).await.unwrap());
        assert!(!service.check_availability(ProductId::new(1), 4).await.unwrap());
        assert!(!service.check_availability(ProductId::new(2), 1).await.unwrap());
        assert_eq!(service.tracker().completed(), 3);
    }

    #[tokio::test]
    async fn test_failing_product() {
        let service = InMemoryInventoryService::new();
        service.set_stock(ProductId::new(1), 10);
        service.set_failing(ProductId::new(1), true);

        let result = service.check_availability(ProductId::new(1), 1).await;
        assert!(matches!(result, Err(CollaboratorError::Unavailable { .. })));

        service.set_failing(ProductId::new(1), false);
        assert!(service.check_availability(ProductId::new(1), 1).await.unwrap());
    }
}
