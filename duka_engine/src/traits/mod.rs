//! # Storage and provider contracts
//!
//! The engine APIs are generic over these traits, so a backend only has to provide the storage primitives and the
//! business rules stay in one place.
//!
//! * [`OrderManagement`] stores orders and their items and performs guarded status transitions, including the stock
//!   ledger entries a transition implies.
//! * [`StockManagement`] is the stock ledger itself: append-only entries plus the current-stock counter.
//! * [`PaymentManagement`] stores payment attempts and settles them exactly once.
//! * [`SubscriptionManagement`] exposes merchant plans and the bookkeeping of the expiry job.
//! * [`NotificationManagement`] stores the durable notifications users see in their inbox.
//! * [`PaymentProvider`] is the mobile-money collaborator. It is implemented outside the engine.
//!
//! [`DukaDatabase`] bundles the storage traits for hosts that want a single bound.
mod data_objects;
mod duka_database;
mod notification_management;
mod order_management;
mod payment_management;
mod payment_provider;
mod stock_management;
mod storage_error;
mod subscription_management;

pub use data_objects::{
    OrderTransition,
    Pagination,
    ReminderWindow,
    SettledPayment,
    StockHistoryPage,
    StockLevel,
    WalletBalance,
};
pub use duka_database::DukaDatabase;
pub use notification_management::NotificationManagement;
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
pub use payment_provider::{PaymentProvider, ProviderError, ProviderTransaction};
pub use stock_management::StockManagement;
pub use storage_error::StorageError;
pub use subscription_management::SubscriptionManagement;
