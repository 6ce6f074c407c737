//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Every test works on freshly
//! generated ids, so they can run in parallel against the same database.
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration
//! ```

use std::sync::Arc;

use common::{Money, NewOrderItem, ProductId};
use order_store::{
    ConstraintKind, NewOrder, OrderId, OrderStatus, OrderStore, PostgresOrderStore, StoreConfig,
    StoreError, UserId,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let store = PostgresOrderStore::connect(&StoreConfig::new(&connection_string))
                .await
                .unwrap();
            store.run_migrations().await.unwrap();
            store.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a store with its own pool
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let mut config = StoreConfig::new(&info.connection_string);
    config.max_connections = 5;
    config.min_connections = 0;
    PostgresOrderStore::connect(&config).await.unwrap()
}

fn item(quantity: i32, cents: i64) -> NewOrderItem {
    NewOrderItem {
        product_id: ProductId::new(),
        quantity,
        price_per_unit: Money::from_cents(cents),
    }
}

fn new_order(user_id: UserId, items: Vec<NewOrderItem>) -> NewOrder {
    NewOrder {
        id: OrderId::new(),
        user_id,
        status: OrderStatus::New,
        total_amount: Money::checked_sum(items.iter().map(|item| item.line_total().unwrap()))
            .unwrap(),
        shipping_address_text: Some("1 Main Street".to_string()),
        items,
    }
}

async fn count_items(store: &PostgresOrderStore, order_id: OrderId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM order_service.order_items WHERE order_id = $1")
        .bind(order_id.as_uuid())
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn create_and_fetch_order_with_items() {
    let store = get_test_store().await;
    let order = new_order(UserId::new(), vec![item(2, 1050), item(1, 2500)]);
    let order_id = order.id;

    let created = store.create_order(order).await.unwrap();
    assert_eq!(created.id, order_id);
    assert_eq!(created.total_amount, Money::from_cents(4600));

    let fetched = store.get_order_by_id(order_id).await.unwrap();
    assert_eq!(fetched.status, OrderStatus::New);
    assert_eq!(fetched.total_amount, Money::from_cents(4600));
    assert_eq!(
        fetched.shipping_address_text.as_deref(),
        Some("1 Main Street")
    );
    assert_eq!(fetched.items.len(), 2);
    for item in &fetched.items {
        assert_eq!(item.order_id, order_id);
        assert!(item.created_at.timestamp() > 0);
        assert!(item.updated_at.timestamp() > 0);
    }
}

#[tokio::test]
async fn fetched_items_keep_insertion_order() {
    let store = get_test_store().await;
    let items: Vec<NewOrderItem> = (1..=6).map(|n| item(n, 100 * i64::from(n))).collect();
    let products: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
    let user_id = UserId::new();

    let created = store
        .create_order(new_order(user_id, items))
        .await
        .unwrap();
    let created_products: Vec<ProductId> = created.items.iter().map(|i| i.product_id).collect();
    assert_eq!(created_products, products);

    let fetched = store.get_order_by_id(created.id).await.unwrap();
    assert_eq!(fetched.items, created.items);

    let listed = store.list_orders_by_user(user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].items, created.items);
}

#[tokio::test]
async fn failing_item_insert_rolls_back_whole_order() {
    let store = get_test_store().await;
    // The second item violates the quantity check constraint
    let order = new_order(UserId::new(), vec![item(1, 100), item(0, 100)]);
    let order_id = order.id;

    let err = store.create_order(order).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::ConstraintViolation {
            kind: ConstraintKind::Check,
            ..
        }
    ));

    let lookup = store.get_order_by_id(order_id).await;
    assert!(matches!(lookup, Err(StoreError::NotFound(id)) if id == order_id));
    assert_eq!(count_items(&store, order_id).await, 0);
}

#[tokio::test]
async fn duplicate_order_id_is_rejected() {
    let store = get_test_store().await;
    let order = new_order(UserId::new(), vec![item(1, 100)]);
    let order_id = order.id;

    store.create_order(order.clone()).await.unwrap();
    let err = store.create_order(order).await.unwrap_err();

    assert!(err.is_duplicate_key());
    assert_eq!(count_items(&store, order_id).await, 1);
}

#[tokio::test]
async fn get_unknown_order_is_not_found() {
    let store = get_test_store().await;
    let missing = OrderId::new();

    let result = store.get_order_by_id(missing).await;
    assert!(matches!(result, Err(StoreError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn update_status_changes_status_and_timestamp() {
    let store = get_test_store().await;
    let created = store
        .create_order(new_order(UserId::new(), vec![item(1, 100)]))
        .await
        .unwrap();

    store
        .update_status(created.id, OrderStatus::Processing)
        .await
        .unwrap();

    let fetched = store.get_order_by_id(created.id).await.unwrap();
    assert_eq!(fetched.status, OrderStatus::Processing);
    assert!(fetched.updated_at >= created.updated_at);
}

#[tokio::test]
async fn update_status_to_same_value_keeps_updated_at() {
    let store = get_test_store().await;
    let created = store
        .create_order(new_order(UserId::new(), vec![item(1, 100)]))
        .await
        .unwrap();
    let before = store.get_order_by_id(created.id).await.unwrap();

    store
        .update_status(created.id, OrderStatus::New)
        .await
        .unwrap();
    store
        .update_status(created.id, OrderStatus::New)
        .await
        .unwrap();

    let after = store.get_order_by_id(created.id).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn update_status_unknown_id_is_not_found() {
    let store = get_test_store().await;
    let missing = OrderId::new();

    let result = store.update_status(missing, OrderStatus::Cancelled).await;
    assert!(matches!(result, Err(StoreError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn conditional_update_distinguishes_conflict_from_missing() {
    let store = get_test_store().await;
    let created = store
        .create_order(new_order(UserId::new(), vec![item(1, 100)]))
        .await
        .unwrap();

    store
        .update_status_if(created.id, OrderStatus::New, OrderStatus::Processing)
        .await
        .unwrap();

    let stale = store
        .update_status_if(created.id, OrderStatus::New, OrderStatus::Cancelled)
        .await;
    assert!(matches!(
        stale,
        Err(StoreError::StatusConflict {
            expected: OrderStatus::New,
            actual: OrderStatus::Processing,
            ..
        })
    ));

    let missing = OrderId::new();
    let result = store
        .update_status_if(missing, OrderStatus::New, OrderStatus::Processing)
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn concurrent_conditional_updates_have_one_winner() {
    let store = get_test_store().await;
    let created = store
        .create_order(new_order(UserId::new(), vec![item(1, 100)]))
        .await
        .unwrap();
    store
        .update_status(created.id, OrderStatus::Processing)
        .await
        .unwrap();

    let (paid, cancelled) = tokio::join!(
        store.update_status_if(created.id, OrderStatus::Processing, OrderStatus::Paid),
        store.update_status_if(created.id, OrderStatus::Processing, OrderStatus::Cancelled),
    );

    assert!(paid.is_ok() ^ cancelled.is_ok());
    let fetched = store.get_order_by_id(created.id).await.unwrap();
    if paid.is_ok() {
        assert_eq!(fetched.status, OrderStatus::Paid);
    } else {
        assert_eq!(fetched.status, OrderStatus::Cancelled);
    }
}

#[tokio::test]
async fn concurrent_identical_conditional_updates_both_succeed() {
    let store = get_test_store().await;
    let created = store
        .create_order(new_order(UserId::new(), vec![item(1, 100)]))
        .await
        .unwrap();
    store
        .update_status(created.id, OrderStatus::Processing)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        store.update_status_if(created.id, OrderStatus::Processing, OrderStatus::Paid),
        store.update_status_if(created.id, OrderStatus::Processing, OrderStatus::Paid),
    );

    first.unwrap();
    second.unwrap();
    let fetched = store.get_order_by_id(created.id).await.unwrap();
    assert_eq!(fetched.status, OrderStatus::Paid);
}

#[tokio::test]
async fn list_orders_by_user_hydrates_items_newest_first() {
    let store = get_test_store().await;
    let user_id = UserId::new();

    let first = store
        .create_order(new_order(user_id, vec![item(1, 100)]))
        .await
        .unwrap();
    let second = store
        .create_order(new_order(user_id, vec![item(1, 200), item(3, 300)]))
        .await
        .unwrap();
    store
        .create_order(new_order(UserId::new(), vec![item(1, 100)]))
        .await
        .unwrap();

    let orders = store.list_orders_by_user(user_id).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, second.id);
    assert_eq!(orders[0].items.len(), 2);
    assert_eq!(orders[1].id, first.id);
    assert_eq!(orders[1].items.len(), 1);
    assert!(
        orders
            .iter()
            .all(|o| o.items.iter().all(|i| i.order_id == o.id))
    );
}

#[tokio::test]
async fn list_orders_for_user_without_orders_is_empty() {
    let store = get_test_store().await;
    let orders = store.list_orders_by_user(UserId::new()).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn ping_succeeds() {
    let store = get_test_store().await;
    store.ping().await.unwrap();
}
