//! Order aggregate shapes.
//!
//! [`Order`] and [`OrderItem`] are the persisted aggregate as read back from
//! the store. [`NewOrder`] and [`NewOrderItem`] are the write shapes handed to
//! the store; they carry no store-assigned fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// A persisted order together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,

    /// Exact sum of `quantity * price_per_unit` over the items, fixed at
    /// creation time.
    pub total_amount: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address_text: Option<String>,

    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the number of item lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// A persisted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_per_unit: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping_address_text: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// An order line ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_per_unit: Money,
}

impl NewOrderItem {
    /// Returns `quantity * price_per_unit`, or `None` if it overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.price_per_unit.checked_mul(self.quantity)
    }
}
