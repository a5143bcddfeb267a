//! The public face of the engine. Each API owns a storage backend (and, for payments, a provider) and enforces the
//! business rules on top of the storage traits.
pub mod errors;
pub mod fees;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_flow_api;
pub mod payment_objects;
pub mod plans;
pub mod stock_ledger_api;
pub mod subscription_api;

mod notifier;
