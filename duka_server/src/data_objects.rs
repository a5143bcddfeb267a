use duka_common::Money;
use duka_engine::{
    db_types::{Order, OrderStatusType, PaymentStatus, StockChangeType},
    order_objects::OrderCreated,
    payment_objects::WebhookOutcome,
};
use log::*;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;
pub const MAX_NOTIFICATION_LIMIT: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedResponse {
    pub order_id: i64,
    pub order_number: i64,
    pub total_price: Money,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stock_warnings: Vec<String>,
    /// Opens a WhatsApp chat with the merchant, pre-filled with the order summary and the confirmation link
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub whatsapp_url: Option<String>,
}

impl OrderPlacedResponse {
    pub fn new(created: &OrderCreated, app_url: &str) -> Self {
        let whatsapp_url = match (&created.merchant_whatsapp, created.confirmation_token()) {
            (Some(number), Some(token)) => whatsapp_link(number, &order_message(&created.order, app_url, token)),
            _ => None,
        };
        Self {
            order_id: created.order.id,
            order_number: created.order.order_number,
            total_price: created.order.total_price,
            stock_warnings: created.stock_warnings.clone(),
            whatsapp_url,
        }
    }
}

fn order_message(order: &Order, app_url: &str, token: &str) -> String {
    format!(
        "New order #{} for {}.\nConfirm: {app_url}/orders/confirm?token={token}\nReject: {app_url}/orders/reject?token={token}",
        order.order_number, order.total_price
    )
}

/// `https://wa.me/<digits>?text=<message>`, or `None` if the number has no digits at all.
pub fn whatsapp_link(number: &str, message: &str) -> Option<String> {
    let digits = number.chars().filter(char::is_ascii_digit).collect::<String>();
    if digits.is_empty() {
        warn!("💻️ Merchant WhatsApp number '{number}' has no digits. No chat link will be offered.");
        return None;
    }
    Url::parse_with_params(&format!("https://wa.me/{digits}"), &[("text", message)]).ok().map(String::from)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionResponse {
    pub order_id: i64,
    pub order_number: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<OrderStatusType>,
}

impl OrderActionResponse {
    pub fn new(order: &Order) -> Self {
        Self { order_id: order.id, order_number: order.order_number, status: None }
    }

    pub fn with_status(order: &Order) -> Self {
        Self { status: Some(order.status), ..Self::new(order) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusQuery {
    #[serde(rename = "ref")]
    pub provider_ref: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChangeRequest {
    pub quantity: i64,
    pub change_type: StockChangeType,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuery {
    #[serde(default)]
    pub ids: String,
}

impl StockQuery {
    /// Parses `ids=1,2,3`. Blank entries are skipped.
    pub fn product_ids(&self) -> Result<Vec<i64>, String> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<i64>().map_err(|_| format!("'{s}' is not a product id")))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPaymentRequest {
    pub plan_name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub amount: Money,
    pub phone_number: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<u32>,
}

impl NotificationsQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT).clamp(1, MAX_NOTIFICATION_LIMIT)
    }
}

/// The body returned to the payment provider. Anything but a 2xx makes the provider retry.
pub fn webhook_ack(outcome: WebhookOutcome) -> Value {
    match outcome {
        WebhookOutcome::Processed => json!({ "received": true, "processed": true }),
        WebhookOutcome::AlreadyProcessed => json!({ "received": true, "alreadyProcessed": true }),
        WebhookOutcome::NotFound => json!({ "received": true, "notFound": true }),
        WebhookOutcome::Ignored => json!({ "received": true, "processed": false }),
    }
}
