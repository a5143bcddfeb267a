use duka_common::Money;
use thiserror::Error;

use crate::db_types::PaymentStatus;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("The payment provider rejected the request. {0}")]
    Rejected(String),
    #[error("The payment provider could not be reached. {0}")]
    Unavailable(String),
}

/// The provider's acknowledgement of a new transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTransaction {
    pub reference: String,
    pub status: PaymentStatus,
}

/// A mobile-money provider that can move money in and out of the platform account.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider: Clone {
    /// Requests `amount` from the wallet behind `phone`. The customer approves the charge on their handset.
    async fn cash_in(&self, phone: &str, amount: Money) -> Result<ProviderTransaction, ProviderError>;

    /// Sends `amount` to the wallet behind `phone`.
    async fn cash_out(&self, phone: &str, amount: Money) -> Result<ProviderTransaction, ProviderError>;

    /// The status reported by the most recent event for `reference`, or `None` if the provider has no events yet.
    async fn latest_status(&self, reference: &str) -> Result<Option<PaymentStatus>, ProviderError>;
}
