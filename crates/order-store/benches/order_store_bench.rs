use criterion::{Criterion, criterion_group, criterion_main};
use domain::{LineItem, Money, Order, OrderNumber, ProductId, UnitPricing, UserId};
use order_store::{InMemoryOrderStore, OrderStore, PartitionRouter};

fn make_order(number: i64, lines: i64) -> Order {
    let unit = UnitPricing::new(Money::from_cents(1250), Money::zero(), Money::zero());
    let items = (1..=lines)
        .map(|p| {
            let mut item = LineItem::new(ProductId::new(p), 2);
            item.apply_pricing(&unit).unwrap();
            item
        })
        .collect();
    let mut order = Order::new(UserId::new(1), items, "bench-key");
    order.recompute_totals().unwrap();
    order.order_number = OrderNumber::new(number);
    order
}

fn bench_route(c: &mut Criterion) {
    let router = PartitionRouter::new(3).unwrap();

    c.bench_function("order_store/route_1000_keys", |b| {
        b.iter(|| {
            let mut hits = [0usize; 3];
            for key in 0..1000 {
                hits[router.route(key)] += 1;
            }
            hits
        });
    });
}

fn bench_create_10_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("order_store/create_10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryOrderStore::new(PartitionRouter::new(3).unwrap());
                store.create(make_order(1000, 10)).await.unwrap();
            });
        });
    });
}

fn bench_get_by_id(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryOrderStore::new(PartitionRouter::new(3).unwrap());
    let ids: Vec<_> = rt.block_on(async {
        let mut ids = Vec::new();
        for number in 0..100 {
            ids.push(store.create(make_order(number, 5)).await.unwrap().id);
        }
        ids
    });

    c.bench_function("order_store/get_by_id", |b| {
        b.iter(|| {
            rt.block_on(async {
                for id in &ids {
                    store.get_by_id(*id).await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_route,
    bench_create_10_lines,
    bench_get_by_id,
);
criterion_main!(benches);
