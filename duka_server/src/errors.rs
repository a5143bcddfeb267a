use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use duka_engine::{
    traits::ProviderError,
    OrderFlowError,
    PaymentFlowError,
    StockLedgerError,
    StorageError,
};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Expired(String),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error("The payment provider could not process the request. {0}")]
    ProviderError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Expired(_) => StatusCode::GONE,
            Self::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ProviderError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No session token was provided.")]
    MissingToken,
    #[error("Session token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Session token signature is invalid.")]
    InvalidSignature,
    #[error("Session token has expired.")]
    Expired,
    #[error("Invalid webhook signature.")]
    InvalidWebhookSignature,
    #[error("Invalid cron secret.")]
    InvalidCronSecret,
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        error!("🗃️ Database error while handling a request. {e}");
        Self::BackendError(e.to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::InvalidRequest(_) |
            OrderFlowError::MixedMerchants |
            OrderFlowError::MissingToken |
            OrderFlowError::AlreadyProcessed(_) |
            OrderFlowError::IllegalTransition { .. } |
            OrderFlowError::NoOp(_) => Self::InvalidRequest(e.to_string()),
            OrderFlowError::ProductNotFound(_) | OrderFlowError::OrderNotFound(_) | OrderFlowError::InvalidToken => {
                Self::NoRecordFound(e.to_string())
            },
            OrderFlowError::ExpiredToken => Self::Expired(e.to_string()),
            OrderFlowError::QuotaExceeded { .. } => Self::QuotaExceeded(e.to_string()),
            OrderFlowError::Forbidden(_) => Self::InsufficientPermissions(e.to_string()),
            OrderFlowError::StorageError(e) => e.into(),
        }
    }
}

impl From<StockLedgerError> for ServerError {
    fn from(e: StockLedgerError) -> Self {
        match e {
            StockLedgerError::ProductNotFound(_) => Self::NoRecordFound(e.to_string()),
            StockLedgerError::Forbidden(_) => Self::InsufficientPermissions(e.to_string()),
            StockLedgerError::InvalidRequest(_) => Self::InvalidRequest(e.to_string()),
            StockLedgerError::StorageError(e) => e.into(),
        }
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::OrderNotFound(_) | PaymentFlowError::PaymentNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PaymentFlowError::Forbidden(_) => Self::InsufficientPermissions(e.to_string()),
            PaymentFlowError::InvalidRequest(_) |
            PaymentFlowError::AlreadyPaid(_) |
            PaymentFlowError::OrderCancelled(_) |
            PaymentFlowError::InvalidPhoneNumber(_) |
            PaymentFlowError::UnknownPlan(_) |
            PaymentFlowError::InsufficientBalance { .. } => Self::InvalidRequest(e.to_string()),
            PaymentFlowError::ProviderError(e) => e.into(),
            PaymentFlowError::StorageError(e) => e.into(),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(e: ProviderError) -> Self {
        error!("💰️ Payment provider error. {e}");
        Self::ProviderError(e.to_string())
    }
}
