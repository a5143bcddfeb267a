use std::collections::HashMap;

use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{InventoryEntry, NewStockChange},
    sqlite::db::products,
    traits::{Pagination, StockHistoryPage, StorageError},
};

/// Appends a ledger entry and updates the product's stock counter. This is not atomic on its own: call it inside a
/// transaction and pass `&mut *tx` so the entry and the counter cannot drift apart.
///
/// The entry records the change that was actually applied. For a sale or write-off that runs into the zero floor,
/// that is less than what was asked for.
pub async fn apply_change(
    change: NewStockChange,
    conn: &mut SqliteConnection,
) -> Result<InventoryEntry, StorageError> {
    let product =
        products::fetch_product(change.product_id, conn).await?.ok_or(StorageError::ProductNotFound(change.product_id))?;
    let requested =
        product.stock.checked_add(change.quantity_change).ok_or(StorageError::StockOutOfRange(product.id))?;
    let new_stock = if requested < 0 && change.change_type.floors_at_zero() {
        debug!(
            "🗃️ {} of {} would take product #{} to {requested}. Stock is floored at zero.",
            change.change_type, change.quantity_change, product.id
        );
        0
    } else {
        requested
    };
    let applied = new_stock - product.stock;
    products::set_stock(product.id, new_stock, conn).await?;
    let entry: InventoryEntry = sqlx::query_as(
        r#"
            INSERT INTO inventory_history (
                product_id,
                organization_id,
                quantity_change,
                change_type,
                reason,
                new_stock,
                order_id,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(change.product_id)
    .bind(change.organization_id)
    .bind(applied)
    .bind(change.change_type)
    .bind(change.reason)
    .bind(new_stock)
    .bind(change.order_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Stock for product #{} is now {new_stock} ({} {})", entry.product_id, entry.change_type, entry.quantity_change);
    Ok(entry)
}

/// How many units each product lost to sales recorded against the order, keyed by product id.
pub async fn sold_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        r#"
            SELECT product_id, -SUM(quantity_change)
            FROM inventory_history
            WHERE order_id = $1 AND change_type = 'sale'
            GROUP BY product_id
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn fetch_history(
    product_id: i64,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<StockHistoryPage, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_history WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;
    let entries = sqlx::query_as(
        "SELECT * FROM inventory_history WHERE product_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(product_id)
    .bind(i64::from(pagination.limit))
    .bind(pagination.offset())
    .fetch_all(conn)
    .await?;
    Ok(StockHistoryPage { entries, total, page: pagination.page, limit: pagination.limit })
}
