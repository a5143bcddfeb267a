//! `SqliteDatabase` is the concrete storage backend of the Duka engine.
//!
//! It implements every storage trait in [`crate::traits`]. Every write runs inside a transaction that is committed
//! before the call returns, so a failure half-way through leaves nothing behind and a read that follows a write
//! always sees it.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{
    db_url,
    inventory,
    new_pool,
    notifications,
    orders,
    organizations,
    payments,
    products,
    run_migrations,
    subscriptions,
};
use crate::{
    db_types::{
        InventoryEntry,
        NewNotification,
        NewOrder,
        NewPayment,
        NewStockChange,
        Notification,
        Order,
        OrderItem,
        OrderStatusType,
        Organization,
        Payment,
        PaymentKind,
        PaymentStatus,
        Product,
        StockChangeType,
        Subscription,
    },
    traits::{
        NotificationManagement,
        OrderManagement,
        OrderTransition,
        Pagination,
        PaymentManagement,
        ReminderWindow,
        SettledPayment,
        StockHistoryPage,
        StockLevel,
        StockManagement,
        StorageError,
        SubscriptionManagement,
        WalletBalance,
    },
};

/// How many times order creation is retried when a concurrent insert takes the same order number.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_organization(&self, organization_id: i64) -> Result<Option<Organization>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(organizations::fetch_organization(organization_id, &mut conn).await?)
    }

    async fn fetch_products(&self, product_ids: &[i64]) -> Result<Vec<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_products(product_ids, &mut conn).await?)
    }

    async fn count_orders_since(&self, organization_id: i64, since: DateTime<Utc>) -> Result<i64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::count_orders_since(organization_id, since, &mut conn).await?)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderItem>), StorageError> {
        let mut attempt = 1;
        loop {
            let mut tx = self.pool.begin().await?;
            match orders::insert_order(&order, &mut tx).await {
                Ok(result) => {
                    tx.commit().await?;
                    return Ok(result);
                },
                Err(StorageError::OrderNumberConflict { organization_id, order_number })
                    if attempt < ORDER_NUMBER_ATTEMPTS =>
                {
                    warn!(
                        "🗃️ Order number {order_number} for merchant #{organization_id} was taken by a concurrent \
                         order. Retrying ({attempt}/{ORDER_NUMBER_ATTEMPTS})"
                    );
                    tx.rollback().await?;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_token(&self, token: &str) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_token(token, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_items(order_id, &mut conn).await?)
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_user(user_id, &mut conn).await?)
    }

    /// Changes the order status and applies the stock ledger consequences in one transaction.
    ///
    /// | From \ To  | Confirmed          | Cancelled                 | Delivered |
    /// |------------|--------------------|---------------------------|-----------|
    /// | Pending    | `sale` per item    | no stock effect           | –         |
    /// | Confirmed  | –                  | `return` of what was sold | no effect |
    ///
    /// Only items whose product tracks inventory get ledger entries. A cancellation returns the units the order's
    /// sale entries actually deducted, which is less than the ordered quantity when the sale hit the zero floor.
    async fn transition_order(
        &self,
        order_id: i64,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Option<OrderTransition>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::update_status_if(order_id, from, to, &mut tx).await? else {
            debug!("🗃️ Order {order_id} is no longer {from}. Nothing was changed.");
            return Ok(None);
        };
        let mut stock_changes = Vec::new();
        let is_sale = matches!((from, to), (OrderStatusType::Pending, OrderStatusType::Confirmed));
        let is_return = matches!((from, to), (OrderStatusType::Confirmed, OrderStatusType::Cancelled));
        if is_sale || is_return {
            let items = orders::fetch_order_items(order_id, &mut tx).await?;
            let product_ids = items.iter().map(|i| i.product_id).collect::<Vec<_>>();
            let tracked = products::fetch_stock_levels(&product_ids, &mut tx).await?;
            let mut sold = if is_return { inventory::sold_for_order(order_id, &mut tx).await? } else { HashMap::new() };
            let reason = format!("Order #{} {to}", order.order_number);
            for item in items {
                if !tracked.get(&item.product_id).map(|s| s.track_inventory).unwrap_or(false) {
                    continue;
                }
                let (quantity_change, change_type) = if is_sale {
                    (-item.quantity, StockChangeType::Sale)
                } else {
                    // Several lines of the same product share one return
                    match sold.remove(&item.product_id) {
                        Some(deducted) if deducted > 0 => (deducted, StockChangeType::Return),
                        _ => continue,
                    }
                };
                let change = NewStockChange::new(
                    item.product_id,
                    order.organization_id,
                    quantity_change,
                    change_type,
                    reason.clone(),
                )
                .for_order(order.id);
                stock_changes.push(inventory::apply_change(change, &mut tx).await?);
            }
        }
        tx.commit().await?;
        debug!("🗃️ {order} moved from {from} to {to}. {} stock entries written.", stock_changes.len());
        Ok(Some(OrderTransition { order, old_status: from, stock_changes }))
    }
}

impl StockManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(product_id, &mut conn).await?)
    }

    async fn apply_stock_change(&self, change: NewStockChange) -> Result<InventoryEntry, StorageError> {
        let mut tx = self.pool.begin().await?;
        let entry = inventory::apply_change(change, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn fetch_stock_levels(&self, product_ids: &[i64]) -> Result<HashMap<i64, StockLevel>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_stock_levels(product_ids, &mut conn).await?)
    }

    async fn fetch_stock_history(
        &self,
        product_id: i64,
        pagination: Pagination,
    ) -> Result<StockHistoryPage, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::fetch_history(product_id, pagination, &mut conn).await?)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StorageError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_payment_by_ref(&self, provider_ref: &str) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_ref(provider_ref, &mut conn).await?)
    }

    async fn settle_payment(
        &self,
        provider_ref: &str,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<SettledPayment>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::update_status_if_pending(provider_ref, status, now, &mut tx).await? else {
            trace!("🗃️ Payment [{provider_ref}] is unknown or already settled");
            return Ok(None);
        };
        let mut settled = SettledPayment { payment, order: None, subscription: None };
        if let (PaymentKind::CashIn, PaymentStatus::Successful) = (settled.payment.kind, status) {
            match (settled.payment.plan_name, settled.payment.order_id) {
                (Some(plan), _) => {
                    let org = settled.payment.organization_id;
                    settled.subscription = Some(subscriptions::activate(org, plan, now, &mut tx).await?);
                },
                (None, Some(order_id)) => {
                    let order = orders::mark_paid(order_id, now, &mut tx).await?;
                    if order.is_none() {
                        warn!("🗃️ Payment [{provider_ref}] was for order {order_id}, which no longer exists");
                    }
                    settled.order = order;
                },
                (None, None) => warn!("🗃️ Payment [{provider_ref}] is not linked to an order or a plan"),
            }
        }
        tx.commit().await?;
        debug!("🗃️ Payment [{provider_ref}] is now {status}");
        Ok(Some(settled))
    }

    async fn fetch_wallet_balance(&self, organization_id: i64) -> Result<WalletBalance, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::wallet_balance(organization_id, &mut conn).await?)
    }
}

impl SubscriptionManagement for SqliteDatabase {
    async fn fetch_subscription(&self, organization_id: i64) -> Result<Option<Subscription>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(subscriptions::fetch_subscription(organization_id, &mut conn).await?)
    }

    async fn expire_subscriptions(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let expired = subscriptions::expire_lapsed(now, &mut tx).await?;
        tx.commit().await?;
        Ok(expired)
    }

    async fn claim_reminders(
        &self,
        window: ReminderWindow,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let claimed = subscriptions::claim_reminders(window, now, &mut tx).await?;
        tx.commit().await?;
        Ok(claimed)
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, StorageError> {
        let mut tx = self.pool.begin().await?;
        let notification = notifications::insert_notification(notification, &mut tx).await?;
        tx.commit().await?;
        Ok(notification)
    }

    async fn fetch_notifications(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(notifications::fetch_for_user(user_id, limit, &mut conn).await?)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `DUKA_DATABASE_URL` or the default location
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Connects to the database at `url`, creating the file if it does not exist yet.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        run_migrations(&self.pool).await
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
