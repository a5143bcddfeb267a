use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde::Serialize;

use crate::{
    db_types::{NewNotification, NotificationKind, Subscription},
    duka_api::{
        notifier::notify,
        plans::{effective_plan, Plan},
    },
    traits::{NotificationManagement, OrderManagement, ReminderWindow, StorageError, SubscriptionManagement},
};

/// What a single maintenance sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSweep {
    pub expired: usize,
    pub reminded_7d: usize,
    pub reminded_1d: usize,
}

pub struct SubscriptionApi<B> {
    db: B,
}

impl<B> Debug for SubscriptionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubscriptionApi")
    }
}

impl<B> SubscriptionApi<B>
where B: SubscriptionManagement + OrderManagement + NotificationManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn subscription(&self, organization_id: i64) -> Result<Option<Subscription>, StorageError> {
        self.db.fetch_subscription(organization_id).await
    }

    /// The plan whose limits apply to the merchant right now.
    pub async fn current_plan(&self, organization_id: i64, now: DateTime<Utc>) -> Result<Plan, StorageError> {
        let subscription = self.db.fetch_subscription(organization_id).await?;
        Ok(effective_plan(subscription.as_ref(), now))
    }

    /// Expires lapsed subscriptions and sends the 7-day and 1-day renewal reminders.
    ///
    /// Every step claims its rows with a conditional update, so overlapping sweeps (the interval worker and the cron
    /// endpoint, say) never notify a merchant twice.
    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> Result<SubscriptionSweep, StorageError> {
        let expired = self.db.expire_subscriptions(now).await?;
        for sub in &expired {
            let message = format!("Your {} plan has expired. Free plan limits now apply.", sub.plan_name);
            self.notify_owner(sub, NotificationKind::SubscriptionExpired, "Subscription expired", message).await;
        }
        let mut sweep = SubscriptionSweep { expired: expired.len(), ..Default::default() };
        for window in [ReminderWindow::SevenDays, ReminderWindow::OneDay] {
            let due = self.db.claim_reminders(window, now).await?;
            for sub in &due {
                let message = format!(
                    "Your {} plan ends on {}. Renew to keep your order limit.",
                    sub.plan_name,
                    sub.current_period_end.format("%Y-%m-%d")
                );
                self.notify_owner(sub, NotificationKind::SubscriptionReminder, "Subscription ending soon", message).await;
            }
            match window {
                ReminderWindow::SevenDays => sweep.reminded_7d = due.len(),
                ReminderWindow::OneDay => sweep.reminded_1d = due.len(),
            }
        }
        if sweep != SubscriptionSweep::default() {
            info!(
                "🕰️ Subscription sweep: {} expired, {} 7-day reminders, {} 1-day reminders",
                sweep.expired, sweep.reminded_7d, sweep.reminded_1d
            );
        }
        Ok(sweep)
    }

    async fn notify_owner(&self, sub: &Subscription, kind: NotificationKind, title: &str, message: String) {
        match self.db.fetch_organization(sub.organization_id).await {
            Ok(Some(org)) => {
                let n = NewNotification::new(org.owner_id, kind, title, message).for_organization(org.id);
                notify(&self.db, n).await;
            },
            Ok(None) => warn!("🕰️ Subscription #{} belongs to a merchant that no longer exists", sub.id),
            Err(e) => warn!("🕰️ Could not look up merchant #{}. {e}", sub.organization_id),
        }
    }
}
