use serde::{Deserialize, Serialize};

use crate::db_types::{InventoryEntry, Money, Order, OrderStatusType, Payment, Subscription};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub stock: i64,
    pub track_inventory: bool,
}

/// A 1-based page request. Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockHistoryPage {
    pub entries: Vec<InventoryEntry>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// The result of a guarded order status change.
#[derive(Debug, Clone)]
pub struct OrderTransition {
    pub order: Order,
    pub old_status: OrderStatusType,
    /// Ledger entries written in the same transaction (sales on confirmation, returns on cancellation)
    pub stock_changes: Vec<InventoryEntry>,
}

/// A payment that this caller moved out of `pending`, along with everything the settlement touched.
#[derive(Debug, Clone)]
pub struct SettledPayment {
    pub payment: Payment,
    /// Set when a successful cash-in paid for an order
    pub order: Option<Order>,
    /// Set when a successful cash-in paid for a plan
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    /// Settled order revenue minus completed and in-flight withdrawals
    pub balance: Money,
    pub pending_withdrawals: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderWindow {
    SevenDays,
    OneDay,
}

impl ReminderWindow {
    pub fn days(&self) -> i64 {
        match self {
            Self::SevenDays => 7,
            Self::OneDay => 1,
        }
    }
}
