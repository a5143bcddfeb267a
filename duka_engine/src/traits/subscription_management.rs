use chrono::{DateTime, Utc};

use crate::{
    db_types::Subscription,
    traits::{ReminderWindow, StorageError},
};

#[allow(async_fn_in_trait)]
pub trait SubscriptionManagement: Clone {
    async fn fetch_subscription(&self, organization_id: i64) -> Result<Option<Subscription>, StorageError>;

    /// Marks every active subscription whose period ended before `now` as expired, returning the updated rows.
    async fn expire_subscriptions(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, StorageError>;

    /// Flags active subscriptions ending within the window that have not had this reminder yet, and returns them.
    /// Each subscription is returned at most once per window and period.
    async fn claim_reminders(
        &self,
        window: ReminderWindow,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, StorageError>;
}
