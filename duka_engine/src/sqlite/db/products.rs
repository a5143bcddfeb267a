use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product},
    traits::StockLevel,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(
        r#"
            INSERT INTO products (
                organization_id,
                name,
                category,
                price,
                visit_fee,
                landlord_owned,
                track_inventory,
                stock,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(product.organization_id)
    .bind(product.name)
    .bind(product.category)
    .bind(product.price)
    .bind(product.visit_fee)
    .bind(product.landlord_owned)
    .bind(product.track_inventory)
    .bind(product.stock)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

fn push_id_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, ids: &'a [i64]) {
    builder.push("(");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
}

pub async fn fetch_products(ids: &[i64], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN ");
    push_id_list(&mut builder, ids);
    builder.build_query_as::<Product>().fetch_all(conn).await
}

/// Reads the stock of all the products in a single statement, so the result is one consistent snapshot.
pub async fn fetch_stock_levels(
    ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<HashMap<i64, StockLevel>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut builder = QueryBuilder::new("SELECT id, stock, track_inventory FROM products WHERE id IN ");
    push_id_list(&mut builder, ids);
    let rows: Vec<(i64, i64, bool)> = builder.build_query_as().fetch_all(conn).await?;
    Ok(rows.into_iter().map(|(id, stock, track_inventory)| (id, StockLevel { stock, track_inventory })).collect())
}

pub async fn set_stock(id: i64, stock: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock = $1, updated_at = $2 WHERE id = $3")
        .bind(stock)
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
