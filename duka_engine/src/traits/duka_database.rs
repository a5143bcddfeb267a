use crate::traits::{
    NotificationManagement,
    OrderManagement,
    PaymentManagement,
    StockManagement,
    SubscriptionManagement,
};

/// Everything a complete Duka backend provides. Implemented automatically for any type that implements all the
/// storage traits.
pub trait DukaDatabase:
    OrderManagement + StockManagement + PaymentManagement + SubscriptionManagement + NotificationManagement
{
}

impl<T> DukaDatabase for T where
    T: OrderManagement + StockManagement + PaymentManagement + SubscriptionManagement + NotificationManagement
{
}
