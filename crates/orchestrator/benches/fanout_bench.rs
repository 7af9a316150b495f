use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use domain::{LineItem, Money, ProductId};
use orchestrator::fanout::check_and_price;
use orchestrator::{FanOut, InMemoryInventoryService, InMemoryPricingService};

fn setup(products: i64) -> (FanOut, Vec<LineItem>) {
    let inventory = InMemoryInventoryService::new();
    let pricing = InMemoryPricingService::new();
    for p in 1..=products {
        inventory.set_stock(ProductId::new(p), 1_000);
        pricing.set_price(ProductId::new(p), Money::from_cents(p * 10));
    }
    let items = (1..=products)
        .map(|p| LineItem::new(ProductId::new(p), 3))
        .collect();
    let fan_out = FanOut::new(
        Arc::new(inventory),
        Arc::new(pricing),
        Duration::from_secs(1),
    );
    (fan_out, items)
}

fn bench_fan_out_10_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (fan_out, items) = setup(10);

    c.bench_function("fanout/10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                fan_out
                    .run(check_and_price(&items), items.len())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_fan_out_100_lines_bounded(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (fan_out, items) = setup(100);
    let fan_out = fan_out.with_max_in_flight(Some(16));

    c.bench_function("fanout/100_lines_max_16", |b| {
        b.iter(|| {
            rt.block_on(async {
                fan_out
                    .run(check_and_price(&items), items.len())
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_fan_out_10_lines, bench_fan_out_100_lines_bounded);
criterion_main!(benches);
