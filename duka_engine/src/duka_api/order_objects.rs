use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OrderLineRequest {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity, notes: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewOrderRequest {
    pub fn with_item(mut self, product_id: i64, quantity: i64) -> Self {
        self.items.push(OrderLineRequest::new(product_id, quantity));
        self
    }
}

/// The outcome of a successful order placement.
#[derive(Debug, Clone)]
pub struct OrderCreated {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Non-fatal: the order was accepted, but tracked stock may not cover it
    pub stock_warnings: Vec<String>,
    /// Where the merchant receives confirmation links, if they configured a number
    pub merchant_whatsapp: Option<String>,
}

impl OrderCreated {
    pub fn confirmation_token(&self) -> Option<&str> {
        self.order.confirmation_token.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Who asked for a status change. The other party is the one who gets notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Merchant,
}
