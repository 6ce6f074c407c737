use std::time::Instant;

use async_trait::async_trait;
use common::{NewOrder, Order, OrderId, OrderStatus, UserId};

use crate::Result;

/// Core trait for order store implementations.
///
/// A store persists the order aggregate (the order row plus its item rows)
/// and reads it back. All implementations must be thread-safe (Send + Sync)
/// and safe to call concurrently from many request tasks.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order and all of its items.
    ///
    /// The write is atomic: either every row becomes visible or none does.
    /// Item ids and timestamps are assigned by the store. Reusing an existing
    /// order id fails with `ConstraintViolation`.
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    /// Loads an order and its items.
    ///
    /// The order row and the item rows are read by two separate queries
    /// without a shared snapshot. Fails with `NotFound` when no order row
    /// exists.
    async fn get_order_by_id(&self, id: OrderId) -> Result<Order>;

    /// Sets the status of an order unconditionally.
    ///
    /// Writing the status the order already has leaves `updated_at`
    /// untouched. Fails with `NotFound` when no row matched.
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Sets the status only if the stored status still equals `expected`.
    ///
    /// Fails with `NotFound` when the id does not exist and with
    /// `StatusConflict` when the order holds neither `expected` nor `status`.
    /// Finding `status` already in place counts as success.
    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<()>;

    /// Lists a user's orders, newest first, with their items.
    ///
    /// Returns an empty list when the user has no orders.
    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Checks that the backing storage is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Records duration and failure metrics for a store operation.
pub(crate) fn observe<T>(operation: &'static str, started: Instant, result: &Result<T>) {
    metrics::histogram!("order_store_query_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    if let Err(err) = result {
        metrics::counter!(
            "order_store_errors_total",
            "operation" => operation,
            "kind" => err.kind_label()
        )
        .increment(1);
    }
}
