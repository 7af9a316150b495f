//! Order workflows: create, update, cancel, status change and delete.

use std::sync::Arc;
use std::time::Duration;

use common::OrderId;
use domain::{LineItem, Order, OrderStatus, UnitPricing};
use order_store::OrderStore;

use crate::error::{CollaboratorError, OrderError, Result};
use crate::fanout::{self, Call, FanOut};
use crate::idempotency::IdempotencyGuard;
use crate::order_number::{OrderNumberGenerator, RandomOrderNumbers};
use crate::publisher::{ChangeKind, EventPublisher};
use crate::services::{InventoryService, PricingService};

/// Tunables for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on a single inventory or pricing call.
    pub collaborator_timeout: Duration,
    /// Upper bound on concurrent collaborator calls per request; `None` runs
    /// every call at once.
    pub max_in_flight: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout: Duration::from_secs(5),
            max_in_flight: None,
        }
    }
}

/// Coordinates the idempotency guard, collaborators, store and publisher.
///
/// Derived amounts are always recomputed here; prices and totals supplied by
/// the caller are ignored.
#[derive(Clone)]
pub struct OrderOrchestrator {
    store: Arc<dyn OrderStore>,
    guard: Arc<dyn IdempotencyGuard>,
    publisher: Arc<dyn EventPublisher>,
    numbers: Arc<dyn OrderNumberGenerator>,
    fan_out: FanOut,
}

impl OrderOrchestrator {
    /// Creates an orchestrator that draws random order numbers.
    pub fn new(
        store: Arc<dyn OrderStore>,
        guard: Arc<dyn IdempotencyGuard>,
        inventory: Arc<dyn InventoryService>,
        pricing: Arc<dyn PricingService>,
        publisher: Arc<dyn EventPublisher>,
        config: OrchestratorConfig,
    ) -> Self {
        let fan_out = FanOut::new(inventory, pricing, config.collaborator_timeout)
            .with_max_in_flight(config.max_in_flight);
        Self {
            store,
            guard,
            publisher,
            numbers: Arc::new(RandomOrderNumbers),
            fan_out,
        }
    }

    /// Replaces the order number source.
    pub fn with_order_numbers(mut self, numbers: Arc<dyn OrderNumberGenerator>) -> Self {
        self.numbers = numbers;
        self
    }

    /// Creates and prices a new order.
    ///
    /// The idempotency token is reserved first; a reused token is rejected
    /// before any collaborator call or write.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, lines = request.line_items.len())
    )]
    pub async fn create(&self, request: Order) -> Result<Order> {
        let result = self.try_create(request).await;
        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(id = %order.id, order_number = %order.order_number, total = %order.total, "order created");
            }
            Err(err) => reject("create", err),
        }
        result
    }

    async fn try_create(&self, request: Order) -> Result<Order> {
        let token = request.idempotency_key.trim().to_string();
        if token.is_empty() {
            return Err(OrderError::InvalidRequest(
                "idempotent_key must not be empty".to_string(),
            ));
        }
        if !self.guard.reserve(&token).await? {
            return Err(OrderError::DuplicateSubmission(token));
        }

        let mut order = Order::new(request.user_id, request.line_items, token);
        order.status = effective_status(request.status, OrderStatus::Created);
        order.order_number = self.numbers.next_number();

        let calls = fanout::check_and_price(&order.line_items);
        let priced = self.fan_out.run(calls, order.line_items.len()).await?;
        apply_pricing(&mut order.line_items, &priced)?;
        order.recompute_totals()?;

        let order = self.store.create(order).await?;
        self.publish(&order, ChangeKind::Created).await?;
        Ok(order)
    }

    /// Rewrites an existing order's user, line items and status.
    ///
    /// Moving to `paid` re-checks stock for every line. Unit prices are kept
    /// from the stored order for products it already has; new products are
    /// priced by the pricing service.
    #[tracing::instrument(skip(self, request), fields(id = %request.id, status = %request.status))]
    pub async fn update(&self, request: Order) -> Result<Order> {
        let result = self.try_update(request).await;
        if let Err(err) = &result {
            reject("update", err);
        }
        result
    }

    async fn try_update(&self, request: Order) -> Result<Order> {
        let existing = self.store.get_by_id(request.id).await?;

        let mut order = Order {
            id: existing.id,
            order_number: existing.order_number,
            user_id: request.user_id,
            line_items: request.line_items,
            status: effective_status(request.status, existing.status.clone()),
            idempotency_key: existing.idempotency_key.clone(),
            created_at: existing.created_at,
            ..Order::default()
        };

        let check_stock = order.status.requires_stock_check();
        let mut units: Vec<Option<UnitPricing>> = Vec::with_capacity(order.line_items.len());
        let mut calls = Vec::new();
        for (line, item) in order.line_items.iter().enumerate() {
            if check_stock {
                calls.push(Call::availability(line, item.product_id, item.quantity));
            }
            let known = existing
                .line_item(item.product_id)
                .and_then(LineItem::unit_pricing);
            if known.is_none() {
                calls.push(Call::pricing(line, item.product_id));
            }
            units.push(known);
        }

        if !calls.is_empty() {
            let fetched = self.fan_out.run(calls, order.line_items.len()).await?;
            for (unit, fetched) in units.iter_mut().zip(fetched) {
                if unit.is_none() {
                    *unit = fetched;
                }
            }
        }
        apply_pricing(&mut order.line_items, &units)?;
        order.recompute_totals()?;

        let order = self.store.update(order).await?;
        self.publish(&order, ChangeKind::Updated).await?;
        tracing::info!(id = %order.id, total = %order.total, "order updated");
        Ok(order)
    }

    /// Marks an order cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: OrderId) -> Result<Order> {
        let result = self.try_cancel(id).await;
        if let Err(err) = &result {
            reject("cancel", err);
        }
        result
    }

    async fn try_cancel(&self, id: OrderId) -> Result<Order> {
        let mut order = self.store.get_by_id(id).await?;
        order.status = OrderStatus::Cancelled;

        let order = self.store.update(order).await?;
        self.publish(&order, ChangeKind::Cancelled).await?;
        tracing::info!(id = %order.id, "order cancelled");
        Ok(order)
    }

    /// Changes only the status of an order.
    ///
    /// Moving to `paid` re-checks stock for the stored line items first.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let result = self.try_update_status(id, status).await;
        if let Err(err) = &result {
            reject("update_status", err);
        }
        result
    }

    async fn try_update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        if status.is_unset() {
            return Err(OrderError::InvalidRequest(
                "status must not be empty".to_string(),
            ));
        }

        if status.requires_stock_check() {
            let existing = self.store.get_by_id(id).await?;
            let calls: Vec<Call> = existing
                .line_items
                .iter()
                .enumerate()
                .map(|(line, item)| Call::availability(line, item.product_id, item.quantity))
                .collect();
            if !calls.is_empty() {
                self.fan_out.run(calls, existing.line_items.len()).await?;
            }
        }

        self.store.update_status(id, &status).await?;
        let order = self.store.get_by_id(id).await?;
        self.publish(&order, ChangeKind::Updated).await?;
        Ok(order)
    }

    /// Removes an order and its line items.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<()> {
        let result = self.try_delete(id).await;
        if let Err(err) = &result {
            reject("delete", err);
        }
        result
    }

    async fn try_delete(&self, id: OrderId) -> Result<()> {
        let order = self.store.get_by_id(id).await?;
        self.store.delete(id).await?;
        self.publish(&order, ChangeKind::Deleted).await?;
        tracing::info!(id = %id, "order deleted");
        Ok(())
    }

    /// Reads an order with its line items.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        Ok(self.store.get_by_id(id).await?)
    }

    async fn publish(&self, order: &Order, kind: ChangeKind) -> Result<()> {
        if let Err(err) = self.publisher.publish(order, kind).await {
            // The write is already committed; the event has to be re-emitted
            // from the stored order.
            tracing::error!(
                id = %order.id,
                key = %kind.event_key(order),
                error = %err,
                "order persisted but change event was not published"
            );
            return Err(err.into());
        }
        metrics::counter!("order_events_published_total", "kind" => kind.as_str()).increment(1);
        Ok(())
    }
}

fn effective_status(requested: OrderStatus, fallback: OrderStatus) -> OrderStatus {
    if requested.is_unset() {
        fallback
    } else {
        requested
    }
}

fn apply_pricing(items: &mut [LineItem], units: &[Option<UnitPricing>]) -> Result<()> {
    for (item, unit) in items.iter_mut().zip(units) {
        let unit = unit.ok_or_else(|| OrderError::CollaboratorUnavailable {
            product_id: item.product_id,
            source: CollaboratorError::Unavailable {
                service: "pricing",
                reason: "no price received".to_string(),
            },
        })?;
        let product_id = item.product_id;
        item.apply_pricing(&unit)
            .map_err(|source| OrderError::LineAmount { product_id, source })?;
    }
    Ok(())
}

fn reject(operation: &'static str, err: &OrderError) {
    metrics::counter!(
        "orders_rejected_total",
        "operation" => operation,
        "reason" => err.reason()
    )
    .increment(1);

    match err {
        OrderError::Persistence(_)
        | OrderError::Publish(_)
        | OrderError::IdempotencyUnavailable(_)
        | OrderError::LineAmount { .. }
        | OrderError::TotalAmount(_) => {
            tracing::error!(operation, error = %err, "order operation failed");
        }
        _ => tracing::warn!(operation, error = %err, "order operation rejected"),
    }
}
