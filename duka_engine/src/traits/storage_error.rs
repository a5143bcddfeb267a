use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("Order number {order_number} is already taken for merchant {organization_id}")]
    OrderNumberConflict { organization_id: i64, order_number: i64 },
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("A payment with reference {0} already exists")]
    PaymentAlreadyExists(String),
    #[error("The stock level of product {0} is out of range")]
    StockOutOfRange(i64),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}
