use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{NewNotification, Notification};

pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO notifications (user_id, organization_id, kind, title, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.organization_id)
    .bind(notification.kind)
    .bind(notification.title)
    .bind(notification.message)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_user(
    user_id: &str,
    limit: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM notifications WHERE user_id = $1 ORDER BY id DESC LIMIT $2")
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(conn)
        .await
}
