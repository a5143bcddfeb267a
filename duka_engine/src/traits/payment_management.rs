use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewPayment, Payment, PaymentStatus},
    traits::{SettledPayment, StorageError, WalletBalance},
};

#[allow(async_fn_in_trait)]
pub trait PaymentManagement: Clone {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StorageError>;

    async fn fetch_payment_by_ref(&self, provider_ref: &str) -> Result<Option<Payment>, StorageError>;

    /// Moves a pending payment to `status`, exactly once.
    ///
    /// The status change is a compare-and-set on `pending`, so concurrent callers (a webhook racing a poll, or a
    /// duplicated webhook) cannot both win. The winner, and only the winner, also applies the consequences of a
    /// successful cash-in in the same transaction:
    /// * with a plan name, the merchant's subscription is activated or extended by one month and its reminder flags
    ///   are cleared;
    /// * otherwise, with a linked order, the order is marked as paid.
    ///
    /// Returns `None` if the payment does not exist or is no longer pending.
    async fn settle_payment(
        &self,
        provider_ref: &str,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<SettledPayment>, StorageError>;

    async fn fetch_wallet_balance(&self, organization_id: i64) -> Result<WalletBalance, StorageError>;
}
