//! Glue between the Paypack client and the engine's [`PaymentProvider`] contract.
use duka_common::Money;
use duka_engine::{
    db_types::{PaymentKind, PaymentStatus},
    payment_objects::SettlementNotice,
    traits::{PaymentProvider, ProviderError, ProviderTransaction},
};
use log::*;
use paypack_tools::{PaypackApi, PaypackApiError, TransactionKind, TransactionStatus, WebhookPayload};

#[derive(Clone)]
pub struct PaypackProvider {
    api: PaypackApi,
}

impl PaypackProvider {
    pub fn new(api: PaypackApi) -> Self {
        Self { api }
    }
}

impl PaymentProvider for PaypackProvider {
    async fn cash_in(&self, phone: &str, amount: Money) -> Result<ProviderTransaction, ProviderError> {
        let tx = self.api.cash_in(phone, amount).await.map_err(provider_error)?;
        Ok(ProviderTransaction { reference: tx.reference, status: payment_status(tx.status) })
    }

    async fn cash_out(&self, phone: &str, amount: Money) -> Result<ProviderTransaction, ProviderError> {
        let tx = self.api.cash_out(phone, amount).await.map_err(provider_error)?;
        Ok(ProviderTransaction { reference: tx.reference, status: payment_status(tx.status) })
    }

    async fn latest_status(&self, reference: &str) -> Result<Option<PaymentStatus>, ProviderError> {
        let events = self.api.transaction_events(reference).await.map_err(provider_error)?;
        Ok(events.latest().map(|e| payment_status(e.data.status)))
    }
}

/// Statuses Paypack may add in future are treated as "not final yet".
pub fn payment_status(status: TransactionStatus) -> PaymentStatus {
    match status {
        TransactionStatus::Successful => PaymentStatus::Successful,
        TransactionStatus::Failed => PaymentStatus::Failed,
        TransactionStatus::Pending => PaymentStatus::Pending,
        TransactionStatus::Unknown => {
            warn!("💰️ Paypack reported a transaction status we do not know. Treating it as pending.");
            PaymentStatus::Pending
        },
    }
}

pub fn payment_kind(kind: TransactionKind) -> PaymentKind {
    match kind {
        TransactionKind::CashIn => PaymentKind::CashIn,
        TransactionKind::CashOut => PaymentKind::CashOut,
    }
}

pub fn settlement_notice(payload: &WebhookPayload) -> SettlementNotice {
    let data = &payload.data;
    SettlementNotice::new(data.reference.as_str(), payment_kind(data.kind), payment_status(data.status))
}

fn provider_error(e: PaypackApiError) -> ProviderError {
    match e {
        PaypackApiError::QueryError { status, message } if (400..500).contains(&status) => {
            ProviderError::Rejected(format!("{status}: {message}"))
        },
        PaypackApiError::InvalidAmount(s) => ProviderError::Rejected(s),
        e => ProviderError::Unavailable(e.to_string()),
    }
}
