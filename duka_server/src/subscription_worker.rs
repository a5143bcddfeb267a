use chrono::{Duration, Utc};
use duka_engine::{SqliteDatabase, SubscriptionApi};
use log::*;
use tokio::task::JoinHandle;

/// Starts the subscription worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick expires lapsed subscriptions and sends renewal reminders. `POST /cron/subscriptions` runs the same job,
/// and the two can overlap safely.
pub fn start_subscription_worker(db: SqliteDatabase, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = interval.to_std().unwrap_or(std::time::Duration::from_secs(3600));
        let mut timer = tokio::time::interval(period);
        let api = SubscriptionApi::new(db);
        info!("🕰️ Subscription worker started. Running every {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running subscription expiry job");
            match api.run_maintenance(Utc::now()).await {
                Ok(sweep) => trace!("🕰️ Subscription job finished: {sweep:?}"),
                Err(e) => error!("🕰️ Error running subscription expiry job: {e}"),
            }
        }
    })
}
