use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Money, Payment, PaymentKind, PaymentStatus},
    traits::SettledPayment,
};

/// Clients stop polling for a payment result after this many seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 120;

/// A provider's statement about a transaction, however it reached us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementNotice {
    pub provider_ref: String,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
}

impl SettlementNotice {
    pub fn new<S: Into<String>>(provider_ref: S, kind: PaymentKind, status: PaymentStatus) -> Self {
        Self { provider_ref: provider_ref.into(), kind, status }
    }
}

/// What happened when a settlement was attempted.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    NotFound,
    /// Someone else settled the payment first. Carries the payment as it is now.
    AlreadyProcessed(Payment),
    Settled(SettledPayment),
}

/// The acknowledgement returned to the provider's webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WebhookOutcome {
    NotFound,
    AlreadyProcessed,
    Processed,
    /// The provider reported a non-terminal status. Nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiated {
    pub payment_id: i64,
    pub paypack_ref: String,
    pub amount: Money,
    pub status: PaymentStatus,
    pub poll_timeout_secs: u64,
}

impl From<&Payment> for PaymentInitiated {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            paypack_ref: payment.provider_ref.clone(),
            amount: payment.amount,
            status: payment.status,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}
