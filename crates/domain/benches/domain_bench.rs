use common::{Money, OrderStatus, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CreateOrderInput, ItemInput, OrderService, check_transition, prepare_order};
use order_store::InMemoryOrderStore;

fn make_input(item_count: usize) -> CreateOrderInput {
    CreateOrderInput {
        order_id: None,
        user_id: UserId::new(),
        items: (0..item_count)
            .map(|i| ItemInput {
                product_id: ProductId::new(),
                quantity: (i % 5 + 1) as i32,
                price_per_unit: Money::from_cents(1099),
            })
            .collect(),
        shipping_address_text: Some("1 Bench Road".to_string()),
    }
}

fn bench_prepare_order(c: &mut Criterion) {
    let small = make_input(3);
    let large = make_input(100);

    c.bench_function("domain/prepare_order_3_items", |b| {
        b.iter(|| prepare_order(small.clone()).unwrap());
    });
    c.bench_function("domain/prepare_order_100_items", |b| {
        b.iter(|| prepare_order(large.clone()).unwrap());
    });
}

fn bench_check_transition(c: &mut Criterion) {
    c.bench_function("domain/check_transition_all_pairs", |b| {
        b.iter(|| {
            let mut allowed = 0;
            for from in OrderStatus::ALL {
                for to in OrderStatus::ALL {
                    if check_transition(from, to).is_ok() {
                        allowed += 1;
                    }
                }
            }
            allowed
        });
    });
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryOrderStore::new());

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.create_order(make_input(3)).await.unwrap();
            });
        });
    });
}

fn bench_status_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryOrderStore::new());

    c.bench_function("domain/create_and_deliver", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order = service.create_order(make_input(1)).await.unwrap();
                for status in [
                    OrderStatus::Processing,
                    OrderStatus::Paid,
                    OrderStatus::Shipped,
                    OrderStatus::Delivered,
                ] {
                    service.update_order_status(order.id, status).await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_prepare_order,
    bench_check_transition,
    bench_create_order,
    bench_status_lifecycle
);
criterion_main!(benches);
