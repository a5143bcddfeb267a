use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewOrder, Order, OrderItem, OrderStatusType, Organization, Product},
    traits::{OrderTransition, StorageError},
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    async fn fetch_organization(&self, organization_id: i64) -> Result<Option<Organization>, StorageError>;

    /// Fetches the given products. Unknown ids are silently left out of the result.
    async fn fetch_products(&self, product_ids: &[i64]) -> Result<Vec<Product>, StorageError>;

    /// The number of orders the merchant has received since `since`, whatever their status.
    async fn count_orders_since(&self, organization_id: i64, since: DateTime<Utc>) -> Result<i64, StorageError>;

    /// Stores the order and its items atomically, assigning the next order number for the merchant.
    ///
    /// Implementations must guarantee that order numbers are unique per merchant, retrying the assignment if a
    /// concurrent insert took the number first.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderItem>), StorageError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, StorageError>;

    async fn fetch_order_by_token(&self, token: &str) -> Result<Option<Order>, StorageError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, StorageError>;

    /// The user's orders, newest first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, StorageError>;

    /// Moves the order from `from` to `to` if, and only if, it is still in `from`.
    ///
    /// In the same transaction, a `pending → confirmed` transition writes a `sale` ledger entry for every tracked item
    /// and a `confirmed → cancelled` transition writes the matching `return` entries.
    ///
    /// Returns `None` when the order was no longer in `from`, i.e. somebody else got there first.
    async fn transition_order(
        &self,
        order_id: i64,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Option<OrderTransition>, StorageError>;
}
