//! Domain layer for the order service.
//!
//! This crate holds the order rules that sit between the HTTP surface and the
//! store:
//! - Order validation and total computation ([`prepare_order`])
//! - The status transition table ([`check_transition`])
//! - [`OrderService`], which applies both around an [`order_store::OrderStore`]

pub mod error;
pub mod service;
pub mod transition;
pub mod validation;

pub use error::{DomainError, ValidationError};
pub use service::OrderService;
pub use transition::{InvalidTransition, Transition, allowed_transitions, check_transition};
pub use validation::{CreateOrderInput, ItemInput, PreparedOrder, prepare_order};
