use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderItem, OrderStatusType},
    traits::StorageError,
};

/// The next order number for the merchant. Not safe on its own under concurrent inserts; the unique constraint on
/// `(organization_id, order_number)` catches collisions and [`insert_order`] reports them as
/// [`StorageError::OrderNumberConflict`].
pub async fn next_order_number(organization_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(MAX(order_number), 0) + 1 FROM orders WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_one(conn)
        .await
}

/// Inserts a new order and its items using the given connection. This is not atomic. You can embed this call inside a
/// transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(
    order: &NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, Vec<OrderItem>), StorageError> {
    let order_number = next_order_number(order.organization_id, &mut *conn).await?;
    let now = Utc::now();
    let result = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (
                order_number,
                user_id,
                organization_id,
                status,
                total_price,
                confirmation_token,
                token_expires_at,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(order_number)
    .bind(&order.user_id)
    .bind(order.organization_id)
    .bind(OrderStatusType::Pending)
    .bind(order.total_price)
    .bind(&order.confirmation_token)
    .bind(order.token_expires_at)
    .bind(&order.notes)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await;
    let saved = match result {
        Ok(saved) => saved,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() && e.message().contains("order_number") => {
            return Err(StorageError::OrderNumberConflict { organization_id: order.organization_id, order_number });
        },
        Err(e) => return Err(e.into()),
    };
    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let saved_item: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, product_id, quantity, price_at_order, subtotal, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *;
            "#,
        )
        .bind(saved.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price_at_order)
        .bind(item.subtotal)
        .bind(&item.notes)
        .fetch_one(&mut *conn)
        .await?;
        items.push(saved_item);
    }
    debug!("🗃️ {saved} saved with {} items", items.len());
    Ok((saved, items))
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_token(token: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE confirmation_token = $1").bind(token).fetch_optional(conn).await
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_orders_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

pub async fn count_orders_since(
    organization_id: i64,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE organization_id = $1 AND created_at >= $2")
        .bind(organization_id)
        .bind(since)
        .fetch_one(conn)
        .await
}

/// Compare-and-set on the order status. Returns `None` if the order is not currently in `from`.
pub async fn update_status_if(
    id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let now = Utc::now();
    let confirmed_at = (to == OrderStatusType::Confirmed).then_some(now);
    sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, updated_at = $2, confirmed_at = COALESCE($3, confirmed_at)
            WHERE id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(now)
    .bind(confirmed_at)
    .bind(id)
    .bind(from)
    .fetch_optional(conn)
    .await
}

/// Flags the order as paid. Paying twice keeps the original `paid_at`.
pub async fn mark_paid(id: i64, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET paid = 1, paid_at = COALESCE(paid_at, $1), updated_at = $1
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await
}
