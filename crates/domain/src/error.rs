//! Domain error types.

use common::{Money, OrderId, OrderStatus};
use order_store::StoreError;
use thiserror::Error;

use crate::transition::InvalidTransition;

/// Reasons an order request is rejected before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("user_id is required")]
    MissingUserId,

    #[error("order must contain at least one item")]
    NoItems,

    #[error("item {index}: quantity must be positive, got {quantity}")]
    InvalidQuantity { index: usize, quantity: i32 },

    #[error("item {index}: price_per_unit must not be negative, got {price}")]
    NegativePrice { index: usize, price: Money },

    #[error("item {index}: product_id is required")]
    MissingProductId { index: usize },

    #[error("item {index}: amount exceeds the supported range")]
    AmountOverflow { index: usize },
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No order exists with the given id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An order with the given id already exists.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The requested status change is not in the transition table.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// The order changed status between the read and the conditional write.
    #[error("Order {order_id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The store failed for a reason the caller cannot fix.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DomainError::NotFound(id),
            StoreError::StatusConflict {
                order_id,
                expected,
                actual,
            } => DomainError::Conflict {
                order_id,
                expected,
                actual,
            },
            other => DomainError::Storage(other),
        }
    }
}
