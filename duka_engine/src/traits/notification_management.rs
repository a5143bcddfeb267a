use crate::{
    db_types::{NewNotification, Notification},
    traits::StorageError,
};

#[allow(async_fn_in_trait)]
pub trait NotificationManagement: Clone {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, StorageError>;

    /// The user's most recent notifications, newest first.
    async fn fetch_notifications(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>, StorageError>;
}
