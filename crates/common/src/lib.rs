//! Shared types for the order service.
//!
//! Identifiers, money, the order status enum and the order aggregate shapes
//! used by both the store and the domain layer.

pub mod model;
pub mod money;
pub mod status;
pub mod types;

pub use model::{NewOrder, NewOrderItem, Order, OrderItem};
pub use money::Money;
pub use status::{OrderStatus, ParseStatusError};
pub use types::{OrderId, OrderItemId, ProductId, UserId};
