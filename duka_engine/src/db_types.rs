use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use duka_common::{Money, RWF_CURRENCY_CODE};
use log::*;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been placed and is waiting for the merchant to accept or reject it.
    Pending,
    /// The merchant accepted the order. Stock for tracked items has been deducted.
    Confirmed,
    /// The order was rejected by the merchant or cancelled by either party. Terminal.
    Cancelled,
    /// The goods have been handed over to the customer. Terminal.
    Delivered,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Delivered)
    }

    /// Orders only move forward: pending → confirmed | cancelled, and confirmed → delivered | cancelled.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!((self, next), (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Delivered) | (Confirmed, Cancelled))
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Delivered => write!(f, "delivered"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "delivered" => Ok(Self::Delivered),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   ProductCategory     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    #[default]
    Standard,
    /// Rental listings. Customers pay a visit fee unless the landlord lists the property directly.
    RealEstate,
}

//--------------------------------------       Product         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub category: ProductCategory,
    pub price: Money,
    pub visit_fee: Option<Money>,
    pub landlord_owned: bool,
    pub track_inventory: bool,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The amount a single unit contributes to what the customer pays, as opposed to the listed price.
    pub fn payable_unit_price(&self) -> Money {
        match self.category {
            ProductCategory::Standard => self.price,
            ProductCategory::RealEstate if self.landlord_owned => self.price,
            ProductCategory::RealEstate => self.visit_fee.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub organization_id: i64,
    pub name: String,
    pub category: ProductCategory,
    pub price: Money,
    pub visit_fee: Option<Money>,
    pub landlord_owned: bool,
    pub track_inventory: bool,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(organization_id: i64, name: S, price: Money) -> Self {
        Self { organization_id, name: name.into(), price, ..Default::default() }
    }

    pub fn with_inventory(mut self, stock: i64) -> Self {
        self.track_inventory = true;
        self.stock = stock;
        self
    }

    pub fn real_estate(mut self, visit_fee: Option<Money>, landlord_owned: bool) -> Self {
        self.category = ProductCategory::RealEstate;
        self.visit_fee = visit_fee;
        self.landlord_owned = landlord_owned;
        self
    }
}

//--------------------------------------    Organization       ---------------------------------------------------------
pub const CURRENT_METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    /// The user that receives merchant notifications
    pub owner_id: String,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Decodes the stored metadata. Malformed or unsupported metadata is logged and replaced with the defaults.
    pub fn metadata(&self) -> OrganizationMetadata {
        OrganizationMetadata::from_json(&self.metadata).unwrap_or_else(|e| {
            warn!("🗃️ Organization #{} has unusable metadata ({e}). Using defaults.", self.id);
            OrganizationMetadata::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMetadata {
    #[serde(default = "current_metadata_version")]
    pub version: u32,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Where order confirmation links are sent
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub timetable: Vec<OpeningHours>,
}

fn current_metadata_version() -> u32 {
    CURRENT_METADATA_VERSION
}

impl Default for OrganizationMetadata {
    fn default() -> Self {
        Self {
            version: CURRENT_METADATA_VERSION,
            timezone: None,
            description: None,
            whatsapp_number: None,
            timetable: Vec::new(),
        }
    }
}

impl OrganizationMetadata {
    pub fn from_json(json: &str) -> Result<Self, ConversionError> {
        let metadata: Self = serde_json::from_str(json).map_err(|e| ConversionError(e.to_string()))?;
        if metadata.version != CURRENT_METADATA_VERSION {
            return Err(ConversionError(format!("Unsupported metadata version {}", metadata.version)));
        }
        Ok(metadata)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningHours {
    /// Three-letter day name, e.g. `Mon`
    pub day: String,
    /// Local time, `HH:MM`
    pub opens: String,
    pub closes: String,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_number: i64,
    pub user_id: String,
    pub organization_id: i64,
    pub status: OrderStatusType,
    pub total_price: Money,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn token_has_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order #{} (id {}, merchant {})", self.order_number, self.id, self.organization_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub price_at_order: Money,
    pub subtotal: Money,
    pub notes: Option<String>,
}

/// A fully priced order, ready to be stored. The order number is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub organization_id: i64,
    pub total_price: Money,
    pub confirmation_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub price_at_order: Money,
    pub subtotal: Money,
    pub notes: Option<String>,
}

//--------------------------------------   StockChangeType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StockChangeType {
    Adjustment,
    Restock,
    Sale,
    Return,
    Damaged,
}

impl StockChangeType {
    /// Sales and write-offs can never push the stock counter below zero. The ledger records the change that was
    /// actually applied, so a floored sale shows the smaller deduction.
    pub fn floors_at_zero(&self) -> bool {
        matches!(self, Self::Sale | Self::Damaged)
    }
}

impl Display for StockChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Adjustment => write!(f, "adjustment"),
            Self::Restock => write!(f, "restock"),
            Self::Sale => write!(f, "sale"),
            Self::Return => write!(f, "return"),
            Self::Damaged => write!(f, "damaged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub id: i64,
    pub product_id: i64,
    pub organization_id: i64,
    pub quantity_change: i64,
    pub change_type: StockChangeType,
    pub reason: String,
    pub new_stock: i64,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStockChange {
    pub product_id: i64,
    pub organization_id: i64,
    pub quantity_change: i64,
    pub change_type: StockChangeType,
    pub reason: String,
    pub order_id: Option<i64>,
}

impl NewStockChange {
    pub fn new<S: Into<String>>(
        product_id: i64,
        organization_id: i64,
        quantity_change: i64,
        change_type: StockChangeType,
        reason: S,
    ) -> Self {
        Self { product_id, organization_id, quantity_change, change_type, reason: reason.into(), order_id: None }
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

//--------------------------------------     PaymentKind       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentKind {
    /// Money flowing from a customer (or merchant, for subscriptions) into the platform account
    #[sqlx(rename = "CASHIN")]
    #[serde(rename = "CASHIN")]
    CashIn,
    /// Money leaving the platform account, i.e. merchant withdrawals
    #[sqlx(rename = "CASHOUT")]
    #[serde(rename = "CASHOUT")]
    CashOut,
}

impl Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CashIn => write!(f, "CASHIN"),
            Self::CashOut => write!(f, "CASHOUT"),
        }
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Successful => write!(f, "successful"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------       Payment         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: String,
    pub organization_id: i64,
    pub phone_number: String,
    /// What the payer is charged (cash-in) or what leaves the wallet (cash-out)
    pub amount: Money,
    pub base_amount: Money,
    pub provider_fee: Money,
    pub platform_fee: Money,
    pub currency: String,
    pub kind: PaymentKind,
    pub plan_name: Option<PlanName>,
    pub provider_ref: String,
    pub status: PaymentStatus,
    pub order_id: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: String,
    pub organization_id: i64,
    pub phone_number: String,
    pub amount: Money,
    pub base_amount: Money,
    pub provider_fee: Money,
    pub platform_fee: Money,
    pub kind: PaymentKind,
    pub plan_name: Option<PlanName>,
    pub provider_ref: String,
    pub order_id: Option<i64>,
}

//--------------------------------------      PlanName         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PlanName {
    Free,
    Starter,
    Growth,
    Pro,
}

impl Display for PlanName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Starter => write!(f, "Starter"),
            Self::Growth => write!(f, "Growth"),
            Self::Pro => write!(f, "Pro"),
        }
    }
}

impl FromStr for PlanName {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "growth" => Ok(Self::Growth),
            "pro" => Ok(Self::Pro),
            _ => Err(ConversionError(format!("Unknown plan: {s}"))),
        }
    }
}

//--------------------------------------    Subscription       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub organization_id: i64,
    pub plan_name: PlanName,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub reminder_sent_7d: bool,
    pub reminder_sent_1d: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.current_period_end > now
    }
}

//--------------------------------------    Notification       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    OrderConfirmed,
    OrderCancelled,
    OrderDelivered,
    OrderPaid,
    PaymentFailed,
    WithdrawalCompleted,
    WithdrawalFailed,
    SubscriptionActivated,
    SubscriptionReminder,
    SubscriptionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub organization_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub organization_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl NewNotification {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        user_id: S1,
        kind: NotificationKind,
        title: S2,
        message: S3,
    ) -> Self {
        Self { user_id: user_id.into(), organization_id: None, kind, title: title.into(), message: message.into() }
    }

    pub fn for_organization(mut self, organization_id: i64) -> Self {
        self.organization_id = Some(organization_id);
        self
    }
}
