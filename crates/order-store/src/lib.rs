//! Transactional persistence for the order aggregate.
//!
//! [`OrderStore`] is the storage seam used by the domain layer. Two
//! implementations are provided: [`PostgresOrderStore`] for production and
//! [`InMemoryOrderStore`] for tests and local development.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatus, UserId};
pub use config::StoreConfig;
pub use error::{ConstraintKind, Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::OrderStore;
