//! Order status state machine.
//!
//! ```text
//! NEW ──► PROCESSING ──┬──► PAID ──► SHIPPED ──► DELIVERED
//!  │          │        └────────────►   │
//!  └──────────┴───────────┴─────────────┴──► CANCELLED
//! ```

use common::OrderStatus;
use thiserror::Error;

/// Outcome of a permitted status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The order already has the requested status; nothing to write.
    NoOp,
    /// The move is in the transition table.
    Allowed,
}

/// Error returned when a status change is not in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid status transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

const FROM_NEW: &[OrderStatus] = &[OrderStatus::Processing, OrderStatus::Cancelled];
const FROM_PROCESSING: &[OrderStatus] = &[
    OrderStatus::Paid,
    OrderStatus::Shipped,
    OrderStatus::Cancelled,
];
const FROM_PAID: &[OrderStatus] = &[OrderStatus::Shipped, OrderStatus::Cancelled];
const FROM_SHIPPED: &[OrderStatus] = &[OrderStatus::Delivered, OrderStatus::Cancelled];

/// Returns the statuses an order may move to from `status`.
///
/// Terminal statuses return an empty slice.
pub fn allowed_transitions(status: OrderStatus) -> &'static [OrderStatus] {
    match status {
        OrderStatus::New => FROM_NEW,
        OrderStatus::Processing => FROM_PROCESSING,
        OrderStatus::Paid => FROM_PAID,
        OrderStatus::Shipped => FROM_SHIPPED,
        OrderStatus::Delivered | OrderStatus::Cancelled => &[],
    }
}

/// Decides whether an order in `current` may move to `requested`.
pub fn check_transition(
    current: OrderStatus,
    requested: OrderStatus,
) -> Result<Transition, InvalidTransition> {
    if current == requested {
        return Ok(Transition::NoOp);
    }
    if allowed_transitions(current).contains(&requested) {
        Ok(Transition::Allowed)
    } else {
        Err(InvalidTransition {
            from: current,
            to: requested,
        })
    }
}
