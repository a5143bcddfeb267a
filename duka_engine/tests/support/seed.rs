use chrono::{DateTime, Duration, Utc};
use duka_engine::{
    db_types::{NewProduct, NotificationKind, Order, Organization, OrganizationMetadata, PlanName, Product, Subscription},
    sqlite::db::{organizations, products, subscriptions},
    NotificationManagement,
    SqliteDatabase,
};

pub async fn seed_merchant(db: &SqliteDatabase, name: &str, owner_id: &str, whatsapp: Option<&str>) -> Organization {
    let metadata = OrganizationMetadata { whatsapp_number: whatsapp.map(String::from), ..Default::default() };
    let mut tx = db.pool().begin().await.expect("Error starting transaction");
    let org = organizations::insert_organization(name, owner_id, &metadata, &mut tx)
        .await
        .expect("Error inserting merchant");
    tx.commit().await.expect("Error committing merchant");
    org
}

pub async fn seed_product(db: &SqliteDatabase, product: NewProduct) -> Product {
    let mut tx = db.pool().begin().await.expect("Error starting transaction");
    let product = products::insert_product(product, &mut tx).await.expect("Error inserting product");
    tx.commit().await.expect("Error committing product");
    product
}

pub async fn fetch_product(db: &SqliteDatabase, id: i64) -> Product {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    products::fetch_product(id, &mut conn).await.expect("Error fetching product").expect("Product does not exist")
}

pub async fn stock_of(db: &SqliteDatabase, id: i64) -> i64 {
    fetch_product(db, id).await.stock
}

/// Moves the order's token expiry into the past.
pub async fn expire_token(db: &SqliteDatabase, order: &Order) {
    let expired = Utc::now() - Duration::hours(1);
    sqlx::query("UPDATE orders SET token_expires_at = $1 WHERE id = $2")
        .bind(expired)
        .bind(order.id)
        .execute(db.pool())
        .await
        .expect("Error expiring token");
}

/// Puts the merchant on `plan` with the current period ending at `period_end`.
pub async fn subscribe(
    db: &SqliteDatabase,
    organization_id: i64,
    plan: PlanName,
    period_end: DateTime<Utc>,
) -> Subscription {
    let mut tx = db.pool().begin().await.expect("Error starting transaction");
    subscriptions::activate(organization_id, plan, Utc::now(), &mut tx).await.expect("Error activating plan");
    sqlx::query("UPDATE subscriptions SET current_period_end = $1 WHERE organization_id = $2")
        .bind(period_end)
        .bind(organization_id)
        .execute(&mut *tx)
        .await
        .expect("Error setting period end");
    let subscription = subscriptions::fetch_subscription(organization_id, &mut tx)
        .await
        .expect("Error fetching subscription")
        .expect("Subscription does not exist");
    tx.commit().await.expect("Error committing subscription");
    subscription
}

pub async fn count_notifications(db: &SqliteDatabase, user_id: &str, kind: NotificationKind) -> usize {
    let notifications = db.fetch_notifications(user_id, 100).await.expect("Error fetching notifications");
    notifications.iter().filter(|n| n.kind == kind).count()
}
