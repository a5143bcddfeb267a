use log::*;

use crate::{db_types::NewNotification, traits::NotificationManagement};

/// Stores a notification. Failures are logged and swallowed: a notification must never undo the state change that
/// caused it.
pub(crate) async fn notify<B: NotificationManagement>(db: &B, notification: NewNotification) {
    let user = notification.user_id.clone();
    let kind = notification.kind;
    match db.insert_notification(notification).await {
        Ok(n) => trace!("📬️ Notification #{} ({kind:?}) stored for {user}", n.id),
        Err(e) => warn!("📬️ Could not store {kind:?} notification for {user}: {e}"),
    }
}
