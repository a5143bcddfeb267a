//! # Paypack tools
//!
//! A thin client for the [Paypack](https://paypack.rw) mobile-money API, and the types needed to read its webhook
//! callbacks.
//!
//! * [`PaypackApi`] authorizes against the agent API, originates cash-in and cash-out transactions and reads the
//!   transaction event feed.
//! * [`helpers::verify_webhook_signature`] checks the `X-Paypack-Signature` header sent with every webhook call.
mod api;
mod config;
mod data_objects;
mod error;

pub mod helpers;

pub use api::PaypackApi;
pub use config::PaypackConfig;
pub use data_objects::{
    AccessToken,
    TransactionEvent,
    TransactionEventData,
    TransactionEvents,
    TransactionKind,
    TransactionResponse,
    TransactionStatus,
    WebhookPayload,
};
pub use error::PaypackApiError;
