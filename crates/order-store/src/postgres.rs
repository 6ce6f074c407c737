use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Money, NewOrder, Order, OrderId, OrderItem, OrderItemId, OrderStatus, ProductId, UserId,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::store::{OrderStore, observe};
use crate::{Result, StoreConfig, StoreError};

const ORDER_COLUMNS: &str =
    "id, user_id, status, total_amount, shipping_address_text, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, price_per_unit, created_at, updated_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool using the given settings.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(config.max_lifetime)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(StoreError::database("connect"))?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// Closes the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database connection pool closed");
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::database("begin create_order"))?;

        match Self::insert_rows(&mut tx, &order).await {
            Ok(created) => {
                tx.commit()
                    .await
                    .map_err(StoreError::database("commit create_order"))?;
                Ok(created)
            }
            Err(err) => {
                // A dropped transaction (panic, cancelled future) rolls back
                // on its own; errors roll back here.
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        order_id = %order.id,
                        error = %rollback_err,
                        "rollback of create_order failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn insert_rows(tx: &mut Transaction<'_, Postgres>, order: &NewOrder) -> Result<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO order_service.orders
                (id, user_id, status, total_amount, shipping_address_text, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING created_at, updated_at
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_amount.amount())
        .bind(order.shipping_address_text.as_deref())
        .fetch_one(&mut **tx)
        .await
        .map_err(StoreError::database("insert order"))?;

        let db = StoreError::database("insert order");
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(db)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(db)?;

        let mut items = Vec::with_capacity(order.items.len());
        for (position, item) in (0_i32..).zip(&order.items) {
            let item_id = OrderItemId::new();
            let row = sqlx::query(
                r#"
                INSERT INTO order_service.order_items
                    (id, order_id, position, product_id, quantity, price_per_unit, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
                RETURNING created_at, updated_at
                "#,
            )
            .bind(item_id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(position)
            .bind(item.product_id.as_uuid())
            .bind(item.quantity)
            .bind(item.price_per_unit.amount())
            .fetch_one(&mut **tx)
            .await
            .map_err(StoreError::database("insert order item"))?;

            let db = StoreError::database("insert order item");
            items.push(OrderItem {
                id: item_id,
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                price_per_unit: item.price_per_unit,
                created_at: row.try_get("created_at").map_err(db)?,
                updated_at: row.try_get("updated_at").map_err(db)?,
            });
        }

        Ok(Order {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            shipping_address_text: order.shipping_address_text.clone(),
            items,
            created_at,
            updated_at,
        })
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Order> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM order_service.orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database("fetch order"))?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(id));
        };
        let mut order = Self::row_to_order(&row)?;

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_service.order_items \
             WHERE order_id = $1 ORDER BY position ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database("fetch order items"))?;

        order.items = rows
            .iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>>>()?;
        Ok(order)
    }

    async fn fetch_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM order_service.orders \
             WHERE user_id = $1 ORDER BY created_at DESC, id ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database("list orders by user"))?;

        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let item_rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_service.order_items \
             WHERE order_id = ANY($1) ORDER BY order_id, position ASC"
        ))
        .bind(order_ids.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database("list order items by user"))?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = Self::row_to_item(row)?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        for order in &mut orders {
            order.items = items_by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn compare_and_set_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE order_service.orders
            SET status = $3,
                updated_at = CASE WHEN status = $3 THEN updated_at ELSE NOW() END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database("conditional order status update"))?;

        if done.rows_affected() > 0 {
            return Ok(());
        }

        // Zero rows: either the id is unknown or another writer moved the
        // status first. A writer that already set the requested status leaves
        // nothing to do.
        match self.fetch_status(id).await? {
            None => Err(StoreError::NotFound(id)),
            Some(actual) if actual == status => Ok(()),
            Some(actual) => Err(StoreError::StatusConflict {
                order_id: id,
                expected,
                actual,
            }),
        }
    }

    /// Reads the stored status of an order, if the order exists.
    async fn fetch_status(&self, id: OrderId) -> Result<Option<OrderStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM order_service.orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::database("fetch order status"))?;

        status
            .map(|s| parse_status("fetch order status", &s))
            .transpose()
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let db = StoreError::database("decode order row");
        let status: String = row.try_get("status").map_err(db)?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db)?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(db)?),
            status: parse_status("decode order row", &status)?,
            total_amount: Money::new(row.try_get::<Decimal, _>("total_amount").map_err(db)?),
            shipping_address_text: row.try_get("shipping_address_text").map_err(db)?,
            items: Vec::new(),
            created_at: row.try_get("created_at").map_err(db)?,
            updated_at: row.try_get("updated_at").map_err(db)?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        let db = StoreError::database("decode order item row");

        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db)?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id").map_err(db)?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id").map_err(db)?),
            quantity: row.try_get("quantity").map_err(db)?,
            price_per_unit: Money::new(
                row.try_get::<Decimal, _>("price_per_unit").map_err(db)?,
            ),
            created_at: row.try_get("created_at").map_err(db)?,
            updated_at: row.try_get("updated_at").map_err(db)?,
        })
    }
}

fn parse_status(operation: &'static str, value: &str) -> Result<OrderStatus> {
    value.parse().map_err(|e: common::ParseStatusError| StoreError::Decode {
        operation,
        message: e.to_string(),
    })
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(
        skip(self, order),
        fields(order_id = %order.id, user_id = %order.user_id, items = order.items.len())
    )]
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let started = Instant::now();
        let result = self.insert_order(order).await;
        observe("create_order", started, &result);
        result
    }

    #[tracing::instrument(skip(self))]
    async fn get_order_by_id(&self, id: OrderId) -> Result<Order> {
        let started = Instant::now();
        let result = self.fetch_order(id).await;
        observe("get_order_by_id", started, &result);
        result
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let started = Instant::now();
        let result = sqlx::query(
            r#"
            UPDATE order_service.orders
            SET status = $2,
                updated_at = CASE WHEN status = $2 THEN updated_at ELSE NOW() END
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database("update order status"))
        .and_then(|done| {
            if done.rows_affected() == 0 {
                Err(StoreError::NotFound(id))
            } else {
                Ok(())
            }
        });

        observe("update_status", started, &result);
        result
    }

    #[tracing::instrument(skip(self))]
    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.compare_and_set_status(id, expected, status).await;

        observe("update_status_if", started, &result);
        result
    }

    #[tracing::instrument(skip(self))]
    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let started = Instant::now();
        let result = self.fetch_orders_by_user(user_id).await;
        observe("list_orders_by_user", started, &result);
        result
    }

    async fn ping(&self) -> Result<()> {
        let started = Instant::now();
        let result = sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StoreError::database("ping"));
        observe("ping", started, &result);
        result
    }
}
