//! Order service combining validation, the transition table and the store.

use common::{Order, OrderId, OrderStatus, UserId};
use order_store::OrderStore;

use crate::error::DomainError;
use crate::transition::{Transition, check_transition};
use crate::validation::{CreateOrderInput, prepare_order};

/// Service for managing orders.
///
/// Validates requests, enforces the status transition table, and maps store
/// failures to [`DomainError`]. The service is stateless apart from the store
/// handle and can be shared across request tasks behind an `Arc`.
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates and persists a new order.
    ///
    /// The caller-supplied id is used when present, otherwise a fresh id is
    /// generated. Invalid input is rejected before the store is touched.
    #[tracing::instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<Order, DomainError> {
        let order_id = input
            .order_id
            .filter(|id| !id.is_nil())
            .unwrap_or_else(OrderId::new);

        let prepared = prepare_order(input).inspect_err(|err| {
            tracing::info!(error = %err, "Rejected invalid order");
        })?;

        let order = self
            .store
            .create_order(prepared.into_new_order(order_id))
            .await
            .map_err(|err| {
                if err.is_duplicate_key() {
                    DomainError::DuplicateOrder(order_id)
                } else {
                    tracing::error!(%order_id, error = %err, "Failed to create order");
                    DomainError::from(err)
                }
            })?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            %order_id,
            items = order.item_count(),
            total_amount = %order.total_amount,
            "Order created"
        );

        Ok(order)
    }

    /// Loads an order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_id(&self, id: OrderId) -> Result<Order, DomainError> {
        self.store.get_order_by_id(id).await.map_err(|err| {
            let err = DomainError::from(err);
            if matches!(err, DomainError::Storage(_)) {
                tracing::error!(order_id = %id, error = %err, "Failed to load order");
            }
            err
        })
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, DomainError> {
        self.store
            .list_orders_by_user(user_id)
            .await
            .map_err(|err| {
                tracing::error!(%user_id, error = %err, "Failed to list orders");
                DomainError::from(err)
            })
    }

    /// Moves an order to `new_status` if the transition table allows it.
    ///
    /// Requesting the current status succeeds without writing. The write is
    /// conditional on the status read here, so a concurrent change made in
    /// between fails with [`DomainError::Conflict`] instead of being
    /// overwritten.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        new_status: OrderStatus,
    ) -> Result<(), DomainError> {
        let current = self.get_order_by_id(id).await?.status;

        let transition = check_transition(current, new_status).inspect_err(|err| {
            tracing::info!(order_id = %id, error = %err, "Rejected status change");
        })?;
        if transition == Transition::NoOp {
            tracing::debug!(order_id = %id, status = %current, "Status unchanged");
            return Ok(());
        }

        self.store
            .update_status_if(id, current, new_status)
            .await
            .map_err(|err| {
                let err = DomainError::from(err);
                match &err {
                    DomainError::Conflict { .. } => {
                        tracing::warn!(order_id = %id, error = %err, "Concurrent status change")
                    }
                    DomainError::Storage(_) => {
                        tracing::error!(order_id = %id, error = %err, "Failed to update status")
                    }
                    _ => {}
                }
                err
            })?;

        metrics::counter!(
            "order_status_transitions_total",
            "from" => current.as_str(),
            "to" => new_status.as_str()
        )
        .increment(1);
        tracing::info!(order_id = %id, from = %current, to = %new_status, "Order status updated");

        Ok(())
    }
}
