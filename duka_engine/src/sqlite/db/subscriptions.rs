use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{PlanName, Subscription},
    helpers::one_month_after,
    traits::ReminderWindow,
};

pub async fn fetch_subscription(
    organization_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM subscriptions WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_optional(conn)
        .await
}

/// Starts or extends the merchant's subscription by one month and clears both reminder flags.
///
/// Renewing the plan that is still running extends it from the end of the current period. Anything else (a new
/// merchant, a lapsed subscription, or a change of plan) starts a fresh period at `now`.
pub async fn activate(
    organization_id: i64,
    plan: PlanName,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Subscription, sqlx::Error> {
    let existing = fetch_subscription(organization_id, &mut *conn).await?;
    let (start, end) = match existing {
        Some(s) if s.is_active_at(now) && s.plan_name == plan => {
            (s.current_period_start, one_month_after(s.current_period_end))
        },
        _ => (now, one_month_after(now)),
    };
    let subscription: Subscription = sqlx::query_as(
        r#"
            INSERT INTO subscriptions (
                organization_id,
                plan_name,
                status,
                current_period_start,
                current_period_end,
                reminder_sent_7d,
                reminder_sent_1d,
                created_at,
                updated_at
            ) VALUES ($1, $2, 'active', $3, $4, 0, 0, $5, $5)
            ON CONFLICT (organization_id) DO UPDATE SET
                plan_name = excluded.plan_name,
                status = 'active',
                current_period_start = excluded.current_period_start,
                current_period_end = excluded.current_period_end,
                reminder_sent_7d = 0,
                reminder_sent_1d = 0,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(organization_id)
    .bind(plan)
    .bind(start)
    .bind(end)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Merchant #{organization_id} is on the {plan} plan until {}", subscription.current_period_end);
    Ok(subscription)
}

pub async fn expire_lapsed(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Subscription>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE subscriptions SET status = 'expired', updated_at = $1
            WHERE status = 'active' AND current_period_end <= $1
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await
}

/// The seven-day reminder covers periods ending in (1 day, 7 days]; the one-day reminder covers (now, 1 day], so a
/// single sweep never sends both.
pub async fn claim_reminders(
    window: ReminderWindow,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Subscription>, sqlx::Error> {
    let window_end = now + Duration::days(window.days());
    let query = match window {
        ReminderWindow::SevenDays => {
            r#"
                UPDATE subscriptions SET reminder_sent_7d = 1, updated_at = $1
                WHERE status = 'active' AND reminder_sent_7d = 0
                  AND current_period_end > $2 AND current_period_end <= $3
                RETURNING *;
            "#
        },
        ReminderWindow::OneDay => {
            r#"
                UPDATE subscriptions SET reminder_sent_1d = 1, updated_at = $1
                WHERE status = 'active' AND reminder_sent_1d = 0
                  AND current_period_end > $2 AND current_period_end <= $3
                RETURNING *;
            "#
        },
    };
    let window_start = match window {
        ReminderWindow::SevenDays => now + Duration::days(ReminderWindow::OneDay.days()),
        ReminderWindow::OneDay => now,
    };
    sqlx::query_as(query).bind(now).bind(window_start).bind(window_end).fetch_all(conn).await
}
