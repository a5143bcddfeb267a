use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{Organization, OrganizationMetadata};

/// Registers a merchant. Organizations are owned by the account service; the engine only needs enough of them to
/// address notifications and read settings.
pub async fn insert_organization(
    name: &str,
    owner_id: &str,
    metadata: &OrganizationMetadata,
    conn: &mut SqliteConnection,
) -> Result<Organization, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO organizations (name, owner_id, metadata, created_at) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(name)
    .bind(owner_id)
    .bind(metadata.to_json())
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn fetch_organization(id: i64, conn: &mut SqliteConnection) -> Result<Option<Organization>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM organizations WHERE id = $1").bind(id).fetch_optional(conn).await
}
