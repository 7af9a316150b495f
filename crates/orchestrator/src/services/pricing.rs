//! Pricing service trait with HTTP and in-memory implementations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use domain::{Money, UnitPricing};
use serde::Deserialize;

use super::{CallTracker, read, trim_base_url, write};
use crate::error::CollaboratorError;

const SERVICE: &str = "pricing";

/// Trait for per-unit price lookups.
#[async_trait]
pub trait PricingService: Send + Sync {
    /// Returns the per-unit final price, markup and discount of a product.
    async fn fetch_pricing(&self, product_id: ProductId) -> Result<UnitPricing, CollaboratorError>;
}

#[derive(Debug, Deserialize)]
struct PricingResponse {
    final_price: Money,
    markup: Money,
    discount: Money,
}

/// Pricing client for `GET {base_url}/products/{id}/pricing`.
#[derive(Debug, Clone)]
pub struct HttpPricingService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPricingService {
    /// Creates a client against the pricing service at `base_url`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url),
        }
    }
}

#[async_trait]
impl PricingService for HttpPricingService {
    #[tracing::instrument(skip(self))]
    async fn fetch_pricing(&self, product_id: ProductId) -> Result<UnitPricing, CollaboratorError> {
        let url = format!("{}/products/{}/pricing", self.base_url, product_id);
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

        let body: PricingResponse =
            response
                .json()
                .await
                .map_err(|source| CollaboratorError::Decode {
                    service: SERVICE,
                    source,
                })?;

        Ok(UnitPricing::new(body.final_price, body.markup, body.discount))
    }
}

#[derive(Debug, Default)]
struct InMemoryPricingState {
    prices: HashMap<ProductId, UnitPricing>,
    failing: HashSet<ProductId>,
}

/// In-memory pricing service for testing.
///
/// Products without a configured price fail like a 404 from the real service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPricingService {
    state: Arc<RwLock<InMemoryPricingState>>,
    latency: Duration,
    tracker: CallTracker,
}

impl InMemoryPricingService {
    /// Creates a new in-memory pricing service.
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

    /// Sets the per-unit pricing of a product.
    pub fn set_pricing(&self, product_id: ProductId, pricing: UnitPricing) {
        write(&self.state).prices.insert(product_id, pricing);
    }

    /// Sets a per-unit final price with no markup or discount.
    pub fn set_price(&self, product_id: ProductId, final_price: Money) {
        self.set_pricing(
            product_id,
            UnitPricing::new(final_price, Money::zero(), Money::zero()),
        );
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
impl PricingService for InMemoryPricingService {
    async fn fetch_pricing(&self, product_id: ProductId) -> Result<UnitPricing, CollaboratorError> {
        let _call = self.tracker.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let state = read(&self.state);
        if state.failing.contains(&product_id) {
            return Err(CollaboratorError::Unavailable {
                service: SERVICE,
                reason: format!("price lookup failed for product {}", product_id),
            });
        }
        state
            .prices
            .get(&product_id)
            .copied()
            .ok_or(CollaboratorError::Status {
                service: SERVICE,
                status: 404,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configured_price_is_returned() {
        let service = InMemoryPricingService::new();
        let pricing = UnitPricing::new(
            Money::from_cents(1000),
            Money::from_cents(100),
            Money::from_cents(50),
        );
        service.set_pricing(ProductId::new(7), pricing);

        assert_eq!(service.fetch_pricing(ProductId::new(7)).await.unwrap(), pricing);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let service = InMemoryPricingService::new();
        let result = service.fetch_pricing(ProductId::new(1)).await;
        assert!(matches!(
            result,
            Err(CollaboratorError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_product() {
        let service = InMemoryPricingService::new();
        service.set_price(ProductId::new(1), Money::from_cents(500));
        service.set_failing(ProductId::new(1), true);

        let result = service.fetch_pricing(ProductId::new(1)).await;
        assert!(matches!(result, Err(CollaboratorError::Unavailable { .. })));
    }
}
