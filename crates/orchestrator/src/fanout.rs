//! Concurrent collaborator calls with first-failure-wins fan-in.
//!
//! Every call runs as its own task in a [`JoinSet`] and reports back tagged
//! with the line index and product it belongs to, so results are matched by
//! identity rather than by arrival position. The first failure decides the
//! outcome; once it is seen no further calls are started, but calls already
//! running are always awaited before returning.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::ProductId;
use domain::{LineItem, UnitPricing};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{CollaboratorError, OrderError, Result};
use crate::services::{InventoryService, PricingService};

/// Which collaborator a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Availability,
    Pricing,
}

impl CallKind {
    fn service(&self) -> &'static str {
        match self {
            CallKind::Availability => "inventory",
            CallKind::Pricing => "pricing",
        }
    }
}

/// One collaborator call for one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    /// Index of the line item in the order.
    pub line: usize,
    pub product_id: ProductId,
    pub quantity: u32,
    pub kind: CallKind,
}

impl Call {
    /// A stock check for `quantity` units.
    pub fn availability(line: usize, product_id: ProductId, quantity: u32) -> Self {
        Self {
            line,
            product_id,
            quantity,
            kind: CallKind::Availability,
        }
    }

    /// A per-unit price lookup.
    pub fn pricing(line: usize, product_id: ProductId) -> Self {
        Self {
            line,
            product_id,
            quantity: 0,
            kind: CallKind::Pricing,
        }
    }

    fn key(&self) -> (usize, CallKind) {
        (self.line, self.kind)
    }
}

/// Plans a stock check and a price lookup for every line item.
pub fn check_and_price(items: &[LineItem]) -> Vec<Call> {
    items
        .iter()
        .enumerate()
        .flat_map(|(line, item)| {
            [
                Call::availability(line, item.product_id, item.quantity),
                Call::pricing(line, item.product_id),
            ]
        })
        .collect()
}

enum Outcome {
    Available(bool),
    Priced(UnitPricing),
}

struct Completed {
    call: Call,
    outcome: std::result::Result<Outcome, CollaboratorError>,
}

/// Runs collaborator calls concurrently.
#[derive(Clone)]
pub struct FanOut {
    inventory: Arc<dyn InventoryService>,
    pricing: Arc<dyn PricingService>,
    timeout: Duration,
    max_in_flight: Option<usize>,
}

impl FanOut {
    /// Creates a fan-out with no bound on concurrent calls.
    pub fn new(
        inventory: Arc<dyn InventoryService>,
        pricing: Arc<dyn PricingService>,
        timeout: Duration,
    ) -> Self {
        Self {
            inventory,
            pricing,
            timeout,
            max_in_flight: None,
        }
    }

    /// Bounds the number of calls running at once.
    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.max_in_flight = max_in_flight.map(|n| n.max(1));
        self
    }

    /// Runs `calls` and returns the unit pricing received for each of the
    /// `lines` line items (`None` where no price lookup was planned).
    ///
    /// Fails with `OutOfStock` for the first unavailable product or with
    /// `CollaboratorUnavailable` for the first failed call, whichever arrives
    /// first.
    #[tracing::instrument(skip(self, calls), fields(calls = calls.len()))]
    pub async fn run(&self, calls: Vec<Call>, lines: usize) -> Result<Vec<Option<UnitPricing>>> {
        let started = Instant::now();
        let stop = CancellationToken::new();
        let limit = self.max_in_flight.unwrap_or(usize::MAX);

        let mut pending = calls.into_iter();
        let mut tasks = JoinSet::new();
        let mut unresolved = HashMap::new();
        let mut priced = vec![None; lines];
        let mut failure: Option<OrderError> = None;
        let mut task_failure: Option<String> = None;

        while tasks.len() < limit {
            let Some(call) = pending.next() else { break };
            unresolved.insert(call.key(), call.product_id);
            self.spawn(&mut tasks, call);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Completed { call, outcome }) => {
                    unresolved.remove(&call.key());
                    match outcome {
                        Ok(Outcome::Priced(pricing)) => {
                            if let Some(slot) = priced.get_mut(call.line) {
                                *slot = Some(pricing);
                            }
                        }
                        Ok(Outcome::Available(true)) => {}
                        Ok(Outcome::Available(false)) => {
                            if failure.is_none() && task_failure.is_none() {
                                tracing::info!(product_id = %call.product_id, "product out of stock");
                                failure = Some(OrderError::OutOfStock {
                                    product_id: call.product_id,
                                });
                            }
                            stop.cancel();
                        }
                        Err(source) => {
                            if failure.is_none() && task_failure.is_none() {
                                tracing::warn!(
                                    product_id = %call.product_id,
                                    service = call.kind.service(),
                                    error = %source,
                                    "collaborator call failed"
                                );
                                failure = Some(OrderError::CollaboratorUnavailable {
                                    product_id: call.product_id,
                                    source,
                                });
                            }
                            stop.cancel();
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "collaborator task failed");
                    if failure.is_none() {
                        task_failure.get_or_insert_with(|| err.to_string());
                    }
                    stop.cancel();
                }
            }

            if !stop.is_cancelled() {
                if let Some(call) = pending.next() {
                    unresolved.insert(call.key(), call.product_id);
                    self.spawn(&mut tasks, call);
                }
            }
        }

        metrics::histogram!("order_fanout_duration_seconds").record(started.elapsed().as_secs_f64());

        if let Some(failure) = failure {
            return Err(failure);
        }
        if let Some(reason) = task_failure {
            // A failed task never reports its call; blame one that went unanswered.
            let product_id = unresolved.values().next().copied().unwrap_or_default();
            return Err(OrderError::CollaboratorUnavailable {
                product_id,
                source: CollaboratorError::TaskFailed(reason),
            });
        }
        Ok(priced)
    }

    fn spawn(&self, tasks: &mut JoinSet<Completed>, call: Call) {
        let inventory = Arc::clone(&self.inventory);
        let pricing = Arc::clone(&self.pricing);
        let timeout = self.timeout;

        tasks.spawn(async move {
            let timed_out = || CollaboratorError::Timeout {
                service: call.kind.service(),
                timeout,
            };
            let outcome = match call.kind {
                CallKind::Availability => tokio::time::timeout(
                    timeout,
                    inventory.check_availability(call.product_id, call.quantity),
                )
                .await
                .map_err(|_| timed_out())
                .and_then(|r| r.map(Outcome::Available)),
                CallKind::Pricing => {
                    tokio::time::timeout(timeout, pricing.fetch_pricing(call.product_id))
                        .await
                        .map_err(|_| timed_out())
                        .and_then(|r| r.map(Outcome::Priced))
                }
            };
            Completed { call, outcome }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CallTracker, InMemoryInventoryService, InMemoryPricingService};
    use domain::Money;

    struct Fixture {
        inventory: InMemoryInventoryService,
        pricing: InMemoryPricingService,
        tracker: CallTracker,
    }

    impl Fixture {
        fn new(latency: Duration) -> Self {
            let tracker = CallTracker::new();
            let inventory = InMemoryInventoryService::new()
                .with_latency(latency)
                .with_tracker(tracker.clone());
            let pricing = InMemoryPricingService::new()
                .with_latency(latency)
                .with_tracker(tracker.clone());
            for p in 1..=10 {
                inventory.set_stock(ProductId::new(p), 100);
                pricing.set_price(ProductId::new(p), Money::from_cents(p * 100));
            }
            Self {
                inventory,
                pricing,
                tracker,
            }
        }

        fn fan_out(&self, timeout: Duration) -> FanOut {
            FanOut::new(
                Arc::new(self.inventory.clone()),
                Arc::new(self.pricing.clone()),
                timeout,
            )
        }
    }

    fn items(products: &[(i64, u32)]) -> Vec<LineItem> {
        products
            .iter()
            .map(|&(p, q)| LineItem::new(ProductId::new(p), q))
            .collect()
    }

    #[test]
    fn test_plan_has_two_calls_per_line() {
        let calls = check_and_price(&items(&[(1, 2), (2, 1)]));
        assert_eq!(
            calls,
            vec![
                Call::availability(0, ProductId::new(1), 2),
                Call::pricing(0, ProductId::new(1)),
                Call::availability(1, ProductId::new(2), 1),
                Call::pricing(1, ProductId::new(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_prices_are_matched_to_their_lines() {
        let fixture = Fixture::new(Duration::ZERO);
        let lines = items(&[(3, 1), (1, 1), (2, 1)]);

        let priced = fixture
            .fan_out(Duration::from_secs(1))
            .run(check_and_price(&lines), lines.len())
            .await
            .unwrap();

        let cents: Vec<i64> = priced
            .iter()
            .map(|p| p.unwrap().final_price.cents())
            .collect();
        assert_eq!(cents, vec![300, 100, 200]);
    }

    #[tokio::test]
    async fn test_calls_overlap() {
        let fixture = Fixture::new(Duration::from_millis(100));
        let lines = items(&[(1, 1), (2, 1), (3, 1), (4, 1), (5, 1)]);

        let started = Instant::now();
        fixture
            .fan_out(Duration::from_secs(5))
            .run(check_and_price(&lines), lines.len())
            .await
            .unwrap();

        // Ten sequential calls would take a full second.
        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(fixture.tracker.peak_in_flight(), 10);
    }

    #[tokio::test]
    async fn test_out_of_stock_wins_and_drains_in_flight_calls() {
        let fixture = Fixture::new(Duration::from_millis(20));
        fixture.inventory.set_stock(ProductId::new(2), 0);
        let lines = items(&[(1, 1), (2, 1), (3, 1)]);

        let result = fixture
            .fan_out(Duration::from_secs(5))
            .run(check_and_price(&lines), lines.len())
            .await;

        assert!(matches!(
            result,
            Err(OrderError::OutOfStock { product_id }) if product_id == ProductId::new(2)
        ));
        assert_eq!(fixture.tracker.in_flight(), 0);
        assert_eq!(fixture.tracker.completed(), 6);
    }

    #[tokio::test]
    async fn test_collaborator_error_names_the_product() {
        let fixture = Fixture::new(Duration::ZERO);
        fixture.pricing.set_failing(ProductId::new(4), true);
        let lines = items(&[(4, 1)]);

        let result = fixture
            .fan_out(Duration::from_secs(1))
            .run(check_and_price(&lines), lines.len())
            .await;

        assert!(matches!(
            result,
            Err(OrderError::CollaboratorUnavailable { product_id, .. }) if product_id == ProductId::new(4)
        ));
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let fixture = Fixture::new(Duration::from_millis(200));
        let lines = items(&[(1, 1)]);

        let result = fixture
            .fan_out(Duration::from_millis(20))
            .run(check_and_price(&lines), lines.len())
            .await;

        assert!(matches!(
            result,
            Err(OrderError::CollaboratorUnavailable {
                source: CollaboratorError::Timeout { .. },
                ..
            })
        ));
        assert_eq!(fixture.tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_bound_limits_concurrency() {
        let fixture = Fixture::new(Duration::from_millis(10));
        let lines = items(&[(1, 1), (2, 1), (3, 1), (4, 1)]);

        fixture
            .fan_out(Duration::from_secs(1))
            .with_max_in_flight(Some(2))
            .run(check_and_price(&lines), lines.len())
            .await
            .unwrap();

        assert_eq!(fixture.tracker.started(), 8);
        assert!(fixture.tracker.peak_in_flight() <= 2);
    }

    #[tokio::test]
    async fn test_no_calls_start_after_failure() {
        let fixture = Fixture::new(Duration::ZERO);
        fixture.inventory.set_stock(ProductId::new(1), 0);
        let lines = items(&[(1, 1), (2, 1), (3, 1)]);

        let result = fixture
            .fan_out(Duration::from_secs(1))
            .with_max_in_flight(Some(1))
            .run(check_and_price(&lines), lines.len())
            .await;

        assert!(matches!(result, Err(OrderError::OutOfStock { .. })));
        assert_eq!(fixture.tracker.started(), 1);
    }

    #[tokio::test]
    async fn test_lines_without_price_lookup_stay_empty() {
        let fixture = Fixture::new(Duration::ZERO);
        let calls = vec![
            Call::availability(0, ProductId::new(1), 1),
            Call::pricing(1, ProductId::new(2)),
        ];

        let priced = fixture
            .fan_out(Duration::from_secs(1))
            .run(calls, 2)
            .await
            .unwrap();

        assert!(priced[0].is_none());
        assert_eq!(priced[1].unwrap().final_price, Money::from_cents(200));
    }
}
