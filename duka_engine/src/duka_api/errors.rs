use thiserror::Error;

use crate::{
    db_types::{Money, OrderStatusType, PlanName},
    traits::{ProviderError, StorageError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("All items in an order must come from the same merchant")]
    MixedMerchants,
    #[error("This merchant has reached the monthly limit of {limit} orders on the {plan} plan")]
    QuotaExceeded { plan: PlanName, limit: i64 },
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("Confirmation token is missing")]
    MissingToken,
    #[error("Invalid confirmation token")]
    InvalidToken,
    #[error("Confirmation token has expired")]
    ExpiredToken,
    #[error("Order already {0}")]
    AlreadyProcessed(OrderStatusType),
    #[error("An order cannot go from {from} to {to}")]
    IllegalTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order status is already {0}")]
    NoOp(OrderStatusType),
    #[error("{0}")]
    StorageError(#[from] StorageError),
}

impl OrderFlowError {
    /// The short code confirmation pages use to explain why a link cannot be used. `None` for errors that are not
    /// about the token or the order's state.
    pub fn token_error_code(&self) -> Option<String> {
        match self {
            Self::MissingToken => Some("missing-token".to_string()),
            Self::InvalidToken => Some("invalid-token".to_string()),
            Self::ExpiredToken => Some("expired-token".to_string()),
            Self::AlreadyProcessed(status) => Some(status.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StockLedgerError {
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("Invalid stock change. {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    StorageError(#[from] StorageError),
}

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("No payment exists with reference {0}")]
    PaymentNotFound(String),
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(i64),
    #[error("Order {0} has been cancelled")]
    OrderCancelled(i64),
    #[error("{0} is not a valid mobile money number")]
    InvalidPhoneNumber(String),
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),
    #[error("Insufficient balance. {available} is available, but {requested} was requested")]
    InsufficientBalance { available: Money, requested: Money },
    #[error("{0}")]
    ProviderError(#[from] ProviderError),
    #[error("{0}")]
    StorageError(#[from] StorageError),
}
