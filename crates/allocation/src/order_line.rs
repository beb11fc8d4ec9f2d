use serde::{Deserialize, Serialize};

use allocation_core::{OrderId, Sku, ValueObject};

/// One line of a customer order: a quantity of a single SKU.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }
}

impl ValueObject for OrderLine {}
