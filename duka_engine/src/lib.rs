//! Duka Engine
//!
//! The Duka engine runs the order lifecycle for small merchants selling over chat: customers place orders, merchants
//! confirm them from a single-use link, stock follows the confirmations, and customers pay with mobile money.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). The engine APIs only talk to storage through the traits, so the
//!    business rules live in one place. The data types used by the database are defined in [`mod@db_types`] and are
//!    public.
//! 2. The engine public API ([`mod@duka_api`]): [`OrderFlowApi`], [`StockLedgerApi`], [`PaymentFlowApi`] and
//!    [`SubscriptionApi`]. Payments go through a [`PaymentProvider`], which the host application supplies.
//!
//! The engine also emits events when orders and payments change. A simple hook system ([`mod@events`]) lets the host
//! forward them to realtime gateways or anything else, without ever blocking or rolling back the change itself.
pub mod db_types;
pub mod duka_api;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use duka_api::{
    errors::{OrderFlowError, PaymentFlowError, StockLedgerError},
    fees::{FeeQuote, FeeSchedule},
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::PaymentFlowApi,
    payment_objects,
    plans,
    stock_ledger_api::StockLedgerApi,
    subscription_api::{SubscriptionApi, SubscriptionSweep},
};
pub use traits::{
    DukaDatabase,
    NotificationManagement,
    OrderManagement,
    PaymentManagement,
    PaymentProvider,
    StockManagement,
    StorageError,
    SubscriptionManagement,
};
