use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, OrderStatusType, Payment, Subscription};

/// Every engine event is addressed to a merchant's realtime channel.
pub trait RealtimeEvent: Serialize + Send + Sync {
    fn event_name(&self) -> &'static str;

    fn organization_id(&self) -> i64;

    fn channel(&self) -> String {
        format!("org-{}", self.organization_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl NewOrderEvent {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }
}

impl RealtimeEvent for NewOrderEvent {
    fn event_name(&self) -> &'static str {
        "order.created"
    }

    fn organization_id(&self) -> i64 {
        self.order.organization_id
    }
}

/// Raised for confirmations, cancellations and deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

impl RealtimeEvent for OrderStatusChangedEvent {
    fn event_name(&self) -> &'static str {
        match self.order.status {
            OrderStatusType::Pending => "order.updated",
            OrderStatusType::Confirmed => "order.confirmed",
            OrderStatusType::Cancelled => "order.cancelled",
            OrderStatusType::Delivered => "order.delivered",
        }
    }

    fn organization_id(&self) -> i64 {
        self.order.organization_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaidEvent {
    pub order: Order,
    pub payment: Payment,
}

impl OrderPaidEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}

impl RealtimeEvent for OrderPaidEvent {
    fn event_name(&self) -> &'static str {
        "order.paid"
    }

    fn organization_id(&self) -> i64 {
        self.order.organization_id
    }
}

/// Raised once per payment, when it leaves the pending state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettledEvent {
    pub payment: Payment,
}

impl PaymentSettledEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

impl RealtimeEvent for PaymentSettledEvent {
    fn event_name(&self) -> &'static str {
        "payment.settled"
    }

    fn organization_id(&self) -> i64 {
        self.payment.organization_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionActivatedEvent {
    pub subscription: Subscription,
}

impl SubscriptionActivatedEvent {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }
}

impl RealtimeEvent for SubscriptionActivatedEvent {
    fn event_name(&self) -> &'static str {
        "subscription.activated"
    }

    fn organization_id(&self) -> i64 {
        self.subscription.organization_id
    }
}

/// The envelope handed to realtime gateways.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub channel: String,
    pub event: String,
    pub data: serde_json::Value,
}

impl RealtimeMessage {
    pub fn from_event<E: RealtimeEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self { channel: event.channel(), event: event.event_name().to_string(), data: serde_json::to_value(event)? })
    }
}
