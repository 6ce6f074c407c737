use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use common::{NewOrder, Order, OrderId, OrderItem, OrderItemId, OrderStatus, UserId};
use tokio::sync::RwLock;

use crate::store::{OrderStore, observe};
use crate::{ConstraintKind, Result, StoreError};

/// In-memory order store implementation for testing.
///
/// Mirrors the PostgreSQL schema constraints (primary key, quantity and price
/// checks) so the domain layer sees the same failures against both stores.
/// Each write happens under a single lock, which makes it atomic.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, StoredOrder>,
    sequence: u64,
}

struct StoredOrder {
    /// Insertion sequence, used to order rows created in the same instant.
    seq: u64,
    order: Order,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of stored item rows across all orders.
    pub async fn item_count(&self) -> usize {
        self.tables
            .read()
            .await
            .orders
            .values()
            .map(|stored| stored.order.items.len())
            .sum()
    }
}

fn check_violation(operation: &'static str, constraint: &str) -> StoreError {
    StoreError::ConstraintViolation {
        operation,
        kind: ConstraintKind::Check,
        constraint: Some(constraint.to_string()),
    }
}

/// Builds the persisted rows, rejecting what the SQL schema would reject.
fn build_rows(order: NewOrder) -> Result<Order> {
    if order.total_amount.is_negative() {
        return Err(check_violation("insert order", "orders_total_amount_check"));
    }

    let now = Utc::now();
    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        if item.quantity <= 0 {
            return Err(check_violation(
                "insert order item",
                "order_items_quantity_check",
            ));
        }
        if item.price_per_unit.is_negative() {
            return Err(check_violation(
                "insert order item",
                "order_items_price_per_unit_check",
            ));
        }
        items.push(OrderItem {
            id: OrderItemId::new(),
            order_id: order.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price_per_unit: item.price_per_unit,
            created_at: now,
            updated_at: now,
        });
    }

    Ok(Order {
        id: order.id,
        user_id: order.user_id,
        status: order.status,
        total_amount: order.total_amount,
        shipping_address_text: order.shipping_address_text,
        items,
        created_at: now,
        updated_at: now,
    })
}

fn apply_status(order: &mut Order, status: OrderStatus) {
    if order.status != status {
        order.status = status;
        order.updated_at = Utc::now();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let started = Instant::now();
        let result = async {
            let mut tables = self.tables.write().await;
            if tables.orders.contains_key(&order.id) {
                return Err(StoreError::ConstraintViolation {
                    operation: "insert order",
                    kind: ConstraintKind::Unique,
                    constraint: Some("orders_pkey".to_string()),
                });
            }

            let created = build_rows(order)?;
            tables.sequence += 1;
            let seq = tables.sequence;
            tables.orders.insert(
                created.id,
                StoredOrder {
                    seq,
                    order: created.clone(),
                },
            );
            Ok::<_, StoreError>(created)
        }
        .await;

        observe("create_order", started, &result);
        result
    }

    async fn get_order_by_id(&self, id: OrderId) -> Result<Order> {
        let started = Instant::now();
        let result = self
            .tables
            .read()
            .await
            .orders
            .get(&id)
            .map(|stored| stored.order.clone())
            .ok_or(StoreError::NotFound(id));

        observe("get_order_by_id", started, &result);
        result
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let started = Instant::now();
        let result = async {
            let mut tables = self.tables.write().await;
            let stored = tables
                .orders
                .get_mut(&id)
                .ok_or(StoreError::NotFound(id))?;
            apply_status(&mut stored.order, status);
            Ok::<_, StoreError>(())
        }
        .await;

        observe("update_status", started, &result);
        result
    }

    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<()> {
        let started = Instant::now();
        let result = async {
            let mut tables = self.tables.write().await;
            let stored = tables
                .orders
                .get_mut(&id)
                .ok_or(StoreError::NotFound(id))?;

            let actual = stored.order.status;
            if actual == expected {
                apply_status(&mut stored.order, status);
            } else if actual != status {
                return Err(StoreError::StatusConflict {
                    order_id: id,
                    expected,
                    actual,
                });
            }
            Ok(())
        }
        .await;

        observe("update_status_if", started, &result);
        result
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let started = Instant::now();
        let tables = self.tables.read().await;
        let mut matching: Vec<&StoredOrder> = tables
            .orders
            .values()
            .filter(|stored| stored.order.user_id == user_id)
            .collect();

        // Newest first
        matching.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        let result = Ok(matching
            .into_iter()
            .map(|stored| stored.order.clone())
            .collect());

        observe("list_orders_by_user", started, &result);
        result
    }

    async fn ping(&self) -> Result<()> {
        let started = Instant::now();
        let result = Ok(());
        observe("ping", started, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, NewOrderItem, ProductId};

    use super::*;

    fn new_order(user_id: UserId, items: Vec<NewOrderItem>) -> NewOrder {
        let total_amount =
            Money::checked_sum(items.iter().map(|item| item.line_total().unwrap())).unwrap();
        NewOrder {
            id: OrderId::new(),
            user_id,
            status: OrderStatus::New,
            total_amount,
            shipping_address_text: None,
            items,
        }
    }

    fn item(quantity: i32, cents: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: ProductId::new(),
            quantity,
            price_per_unit: Money::from_cents(cents),
        }
    }

    #[tokio::test]
    async fn create_and_get_order() {
        let store = InMemoryOrderStore::new();
        let order = new_order(UserId::new(), vec![item(2, 1050), item(1, 2500)]);
        let order_id = order.id;

        let created = store.create_order(order).await.unwrap();
        assert_eq!(created.id, order_id);
        assert_eq!(created.items.len(), 2);
        assert!(created.items.iter().all(|i| i.order_id == order_id));

        let loaded = store.get_order_by_id(order_id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.item_count().await, 2);
    }

    #[tokio::test]
    async fn duplicate_id_is_a_unique_violation() {
        let store = InMemoryOrderStore::new();
        let order = new_order(UserId::new(), vec![item(1, 100)]);

        store.create_order(order.clone()).await.unwrap();
        let err = store.create_order(order).await.unwrap_err();

        assert!(err.is_duplicate_key());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn failing_second_item_leaves_no_rows() {
        let store = InMemoryOrderStore::new();
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

        assert!(matches!(
            store.get_order_by_id(order_id).await,
            Err(StoreError::NotFound(id)) if id == order_id
        ));
        assert_eq!(store.item_count().await, 0);
    }

    #[tokio::test]
    async fn update_status_same_value_keeps_updated_at() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create_order(new_order(UserId::new(), vec![item(1, 100)]))
            .await
            .unwrap();

        store
            .update_status(created.id, OrderStatus::New)
            .await
            .unwrap();

        let loaded = store.get_order_by_id(created.id).await.unwrap();
        assert_eq!(loaded.updated_at, created.updated_at);
    }

    #[tokio::test]
    async fn update_status_unknown_id_is_not_found() {
        let store = InMemoryOrderStore::new();
        let missing = OrderId::new();

        let err = store
            .update_status(missing, OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn conditional_update_detects_stale_status() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create_order(new_order(UserId::new(), vec![item(1, 100)]))
            .await
            .unwrap();

        store
            .update_status_if(created.id, OrderStatus::New, OrderStatus::Processing)
            .await
            .unwrap();

        let err = store
            .update_status_if(created.id, OrderStatus::New, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusConflict {
                expected: OrderStatus::New,
                actual: OrderStatus::Processing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn conditional_update_already_at_target_succeeds() {
        let store = InMemoryOrderStore::new();
        let created = store
            .create_order(new_order(UserId::new(), vec![item(1, 100)]))
            .await
            .unwrap();
        store
            .update_status_if(created.id, OrderStatus::New, OrderStatus::Processing)
            .await
            .unwrap();
        let before = store.get_order_by_id(created.id).await.unwrap();

        // A second identical request lost the race but got what it asked for
        store
            .update_status_if(created.id, OrderStatus::New, OrderStatus::Processing)
            .await
            .unwrap();

        let after = store.get_order_by_id(created.id).await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn items_keep_insertion_order() {
        let store = InMemoryOrderStore::new();
        let items = vec![item(1, 100), item(2, 200), item(3, 300)];
        let products: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();

        let created = store
            .create_order(new_order(UserId::new(), items))
            .await
            .unwrap();
        let loaded = store.get_order_by_id(created.id).await.unwrap();

        let loaded_products: Vec<ProductId> = loaded.items.iter().map(|i| i.product_id).collect();
        assert_eq!(loaded_products, products);
        assert_eq!(loaded.items, created.items);
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let store = InMemoryOrderStore::new();
        let user_id = UserId::new();

        let first = store
            .create_order(new_order(user_id, vec![item(1, 100)]))
            .await
            .unwrap();
        let second = store
            .create_order(new_order(user_id, vec![item(2, 200)]))
            .await
            .unwrap();
        store
            .create_order(new_order(UserId::new(), vec![item(1, 100)]))
            .await
            .unwrap();

        let orders = store.list_orders_by_user(user_id).await.unwrap();
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn list_orders_for_unknown_user_is_empty() {
        let store = InMemoryOrderStore::new();
        let orders = store.list_orders_by_user(UserId::new()).await.unwrap();
        assert!(orders.is_empty());
    }
}
