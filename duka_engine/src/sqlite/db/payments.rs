use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, NewPayment, Payment, PaymentStatus, RWF_CURRENCY_CODE},
    traits::{StorageError, WalletBalance},
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, StorageError> {
    let now = Utc::now();
    let provider_ref = payment.provider_ref.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO payments (
                user_id,
                organization_id,
                phone_number,
                amount,
                base_amount,
                provider_fee,
                platform_fee,
                currency,
                kind,
                plan_name,
                provider_ref,
                status,
                order_id,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *;
        "#,
    )
    .bind(payment.user_id)
    .bind(payment.organization_id)
    .bind(payment.phone_number)
    .bind(payment.amount)
    .bind(payment.base_amount)
    .bind(payment.provider_fee)
    .bind(payment.platform_fee)
    .bind(RWF_CURRENCY_CODE)
    .bind(payment.kind)
    .bind(payment.plan_name)
    .bind(payment.provider_ref)
    .bind(PaymentStatus::Pending)
    .bind(payment.order_id)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(payment) => Ok(payment),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StorageError::PaymentAlreadyExists(provider_ref)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment_by_ref(
    provider_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE provider_ref = $1").bind(provider_ref).fetch_optional(conn).await
}

/// Compare-and-set from `pending` to `status`. Returns `None` if the payment is unknown or was already settled.
pub async fn update_status_if_pending(
    provider_ref: &str,
    status: PaymentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET status = $1, processed_at = $2, updated_at = $2
            WHERE provider_ref = $3 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(now)
    .bind(provider_ref)
    .fetch_optional(conn)
    .await
}

/// Order revenue is credited net of fees. Withdrawals are debited as soon as they are requested, and credited back
/// only by failing.
pub async fn wallet_balance(organization_id: i64, conn: &mut SqliteConnection) -> Result<WalletBalance, sqlx::Error> {
    let (revenue, withdrawn, pending): (i64, i64, i64) = sqlx::query_as(
        r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'CASHIN' AND status = 'successful' AND plan_name IS NULL
                    AND order_id IS NOT NULL THEN base_amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN kind = 'CASHOUT' AND status = 'successful' THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN kind = 'CASHOUT' AND status = 'pending' THEN amount ELSE 0 END), 0)
            FROM payments
            WHERE organization_id = $1;
        "#,
    )
    .bind(organization_id)
    .fetch_one(conn)
    .await?;
    Ok(WalletBalance {
        balance: Money::from(revenue - withdrawn - pending),
        pending_withdrawals: Money::from(pending),
    })
}
