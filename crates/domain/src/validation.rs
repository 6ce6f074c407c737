//! Order request validation.
//!
//! [`prepare_order`] turns a raw create request into a [`PreparedOrder`]:
//! every item is checked, the status is set to `NEW`, and the total is
//! computed exactly from the items. No storage is touched.

use common::{Money, NewOrder, NewOrderItem, OrderId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A requested order line.
///
/// Missing fields deserialize to nil/zero values so that validation, not the
/// decoder, reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInput {
    #[serde(default = "ProductId::nil")]
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub price_per_unit: Money,
}

/// A request to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderInput {
    /// Caller-chosen order id; generated by the service when absent.
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default = "UserId::nil")]
    pub user_id: UserId,
    #[serde(default)]
    pub items: Vec<ItemInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address_text: Option<String>,
}

/// A validated order without persistence identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping_address_text: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl PreparedOrder {
    /// Attaches the order id, producing the shape the store inserts.
    pub fn into_new_order(self, id: OrderId) -> NewOrder {
        NewOrder {
            id,
            user_id: self.user_id,
            status: self.status,
            total_amount: self.total_amount,
            shipping_address_text: self.shipping_address_text,
            items: self.items,
        }
    }
}

/// Validates a create request and computes its derived fields.
///
/// The first failing check is reported. Item checks run in input order, so
/// the reported index is the earliest offending item.
pub fn prepare_order(input: CreateOrderInput) -> Result<PreparedOrder, ValidationError> {
    if input.user_id.is_nil() {
        return Err(ValidationError::MissingUserId);
    }
    if input.items.is_empty() {
        return Err(ValidationError::NoItems);
    }

    let mut items = Vec::with_capacity(input.items.len());
    let mut total_amount = Money::zero();
    for (index, item) in input.items.into_iter().enumerate() {
        if item.quantity <= 0 {
            return Err(ValidationError::InvalidQuantity {
                index,
                quantity: item.quantity,
            });
        }
        if item.price_per_unit.is_negative() {
            return Err(ValidationError::NegativePrice {
                index,
                price: item.price_per_unit,
            });
        }
        if item.product_id.is_nil() {
            return Err(ValidationError::MissingProductId { index });
        }

        let item = NewOrderItem {
            product_id: item.product_id,
            quantity: item.quantity,
            price_per_unit: item.price_per_unit,
        };
        total_amount = item
            .line_total()
            .and_then(|line| total_amount.checked_add(line))
            .ok_or(ValidationError::AmountOverflow { index })?;
        items.push(item);
    }

    let shipping_address_text = input
        .shipping_address_text
        .filter(|text| !text.trim().is_empty());

    Ok(PreparedOrder {
        user_id: input.user_id,
        status: OrderStatus::New,
        total_amount,
        shipping_address_text,
        items,
    })
}
