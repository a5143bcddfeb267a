use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
    pub refresh: String,
    /// Unix timestamp (seconds) after which the access token is rejected
    pub expires: i64,
}

impl AccessToken {
    /// True if the token expires within `margin_secs` of `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.expires - margin_secs <= now.timestamp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "CASHIN")]
    CashIn,
    #[serde(rename = "CASHOUT")]
    CashOut,
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CashIn => write!(f, "CASHIN"),
            Self::CashOut => write!(f, "CASHOUT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Successful,
    Failed,
    #[serde(other)]
    Unknown,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Successful => write!(f, "successful"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The response to a cash-in or cash-out request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    #[serde(rename = "ref")]
    pub reference: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEventData {
    #[serde(rename = "ref")]
    pub reference: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: f64,
    #[serde(default)]
    pub fee: Option<f64>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_kind: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub data: TransactionEventData,
}

/// Paypack posts a single transaction event to the webhook endpoint.
pub type WebhookPayload = TransactionEvent;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionEvents {
    #[serde(default)]
    pub transactions: Vec<TransactionEvent>,
}

impl TransactionEvents {
    /// The most recent event in the feed. Events without a timestamp sort first.
    pub fn latest(&self) -> Option<&TransactionEvent> {
        self.transactions.iter().max_by_key(|e| e.created_at.or(e.data.created_at))
    }
}
