use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Debug,
};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{
        Money,
        NewNotification,
        NewOrder,
        NewOrderItem,
        Notification,
        NotificationKind,
        Order,
        OrderStatusType,
        Product,
    },
    duka_api::{
        errors::OrderFlowError,
        notifier::notify,
        order_objects::{Actor, NewOrderRequest, OrderCreated, OrderWithItems},
        plans::effective_plan,
    },
    events::{EventProducers, NewOrderEvent, OrderStatusChangedEvent},
    helpers::{new_confirmation_token, start_of_month},
    traits::{NotificationManagement, OrderManagement, OrderTransition, SubscriptionManagement},
};

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 48;

/// `OrderFlowApi` takes orders from the customer's cart to the merchant's door: placement, confirmation by token,
/// cancellation, and merchant status updates. Stock ledger entries follow the status changes.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    token_ttl: Duration,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS) }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + SubscriptionManagement + NotificationManagement
{
    /// Places an order for `user_id`.
    ///
    /// Every check happens before anything is written: the cart must be non-empty with positive quantities, every
    /// product must exist, all products must belong to one merchant, and the merchant must be under the monthly order
    /// limit of their plan. Stock is only advisory here. Short stock produces warnings, and the order still goes
    /// through; overselling is settled when the merchant confirms.
    pub async fn create_order(&self, user_id: &str, request: NewOrderRequest) -> Result<OrderCreated, OrderFlowError> {
        if request.items.is_empty() {
            return Err(OrderFlowError::InvalidRequest("An order needs at least one item".into()));
        }
        if let Some(line) = request.items.iter().find(|l| l.quantity < 1) {
            return Err(OrderFlowError::InvalidRequest(format!(
                "Quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        let mut ids = request.items.iter().map(|l| l.product_id).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        let products: HashMap<i64, Product> =
            self.db.fetch_products(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
        if let Some(missing) = ids.iter().find(|id| !products.contains_key(id)) {
            return Err(OrderFlowError::ProductNotFound(*missing));
        }
        let merchants = products.values().map(|p| p.organization_id).collect::<HashSet<_>>();
        let organization_id = match merchants.into_iter().collect::<Vec<_>>().as_slice() {
            [single] => *single,
            _ => return Err(OrderFlowError::MixedMerchants),
        };

        let now = Utc::now();
        let subscription = self.db.fetch_subscription(organization_id).await?;
        let plan = effective_plan(subscription.as_ref(), now);
        if let Some(limit) = plan.monthly_order_limit {
            let used = self.db.count_orders_since(organization_id, start_of_month(now)).await?;
            if used >= limit {
                info!("📦️ Merchant #{organization_id} has used {used}/{limit} orders this month. Order rejected.");
                return Err(OrderFlowError::QuotaExceeded { plan: plan.name, limit });
            }
        }

        let mut total = Money::default();
        let mut items = Vec::with_capacity(request.items.len());
        let mut requested = BTreeMap::<i64, i64>::new();
        for line in request.items {
            let product = products.get(&line.product_id).ok_or(OrderFlowError::ProductNotFound(line.product_id))?;
            let too_large =
                || OrderFlowError::InvalidRequest(format!("{} of '{}' is too large", line.quantity, product.name));
            let payable = product.payable_unit_price().checked_mul(line.quantity).ok_or_else(too_large)?;
            total = total.checked_add(payable).ok_or_else(too_large)?;
            let subtotal = product.price.checked_mul(line.quantity).ok_or_else(too_large)?;
            let requested_quantity = requested.entry(product.id).or_default();
            *requested_quantity = requested_quantity.checked_add(line.quantity).ok_or_else(too_large)?;
            items.push(NewOrderItem {
                product_id: product.id,
                quantity: line.quantity,
                price_at_order: product.price,
                subtotal,
                notes: line.notes,
            });
        }
        let stock_warnings = requested
            .into_iter()
            .filter_map(|(id, quantity)| products.get(&id).map(|p| (p, quantity)))
            .filter(|(p, quantity)| p.track_inventory && p.stock < *quantity)
            .map(|(p, quantity)| format!("Only {} of '{}' in stock, but {quantity} were ordered", p.stock, p.name))
            .collect::<Vec<_>>();

        let new_order = NewOrder {
            user_id: user_id.to_string(),
            organization_id,
            total_price: total,
            confirmation_token: new_confirmation_token(),
            token_expires_at: now + self.token_ttl,
            notes: request.notes,
            items,
        };
        let (order, items) = self.db.insert_order(new_order).await?;
        info!("📦️ {order} placed by {user_id} for {}", order.total_price);
        if !stock_warnings.is_empty() {
            debug!("📦️ {order} has {} stock warnings", stock_warnings.len());
        }

        let organization = self.db.fetch_organization(organization_id).await?;
        if let Some(org) = &organization {
            let message = format!("Order #{} for {} is waiting for your confirmation.", order.order_number, total);
            let notification = NewNotification::new(&org.owner_id, NotificationKind::NewOrder, "New order", message)
                .for_organization(org.id);
            notify(&self.db, notification).await;
        }
        self.producers.publish_new_order(NewOrderEvent::new(order.clone(), items.clone())).await;
        let merchant_whatsapp = organization.and_then(|o| o.metadata().whatsapp_number);
        Ok(OrderCreated { order, items, stock_warnings, merchant_whatsapp })
    }

    /// Checks a confirmation token in this order: present, known, unexpired, and the order still pending.
    ///
    /// Nothing is modified, so confirmation pages can call this freely to decide what to show.
    pub async fn check_token(&self, token: Option<&str>) -> Result<Order, OrderFlowError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(OrderFlowError::MissingToken)?;
        let order = self.db.fetch_order_by_token(token).await?.ok_or(OrderFlowError::InvalidToken)?;
        if order.token_has_expired(Utc::now()) {
            debug!("📦️ Confirmation token for {order} has expired");
            return Err(OrderFlowError::ExpiredToken);
        }
        if order.status != OrderStatusType::Pending {
            return Err(OrderFlowError::AlreadyProcessed(order.status));
        }
        Ok(order)
    }

    /// Accepts the order on the merchant's behalf and deducts stock for every tracked item.
    pub async fn confirm_by_token(&self, token: Option<&str>) -> Result<Order, OrderFlowError> {
        let order = self.check_token(token).await?;
        let transition = self.transition(&order, OrderStatusType::Confirmed, Actor::Merchant).await?;
        Ok(transition.order)
    }

    /// Rejects the order on the merchant's behalf. Nothing was deducted yet, so stock is untouched.
    pub async fn reject_by_token(&self, token: Option<&str>) -> Result<Order, OrderFlowError> {
        let order = self.check_token(token).await?;
        let transition = self.transition(&order, OrderStatusType::Cancelled, Actor::Merchant).await?;
        Ok(transition.order)
    }

    /// Cancels the order at the customer's request. Stock deducted at confirmation is returned.
    pub async fn cancel_by_customer(&self, user_id: &str, order_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} belongs to another customer")));
        }
        match order.status {
            OrderStatusType::Cancelled => return Err(OrderFlowError::AlreadyProcessed(order.status)),
            OrderStatusType::Delivered => {
                return Err(OrderFlowError::IllegalTransition {
                    from: OrderStatusType::Delivered,
                    to: OrderStatusType::Cancelled,
                })
            },
            OrderStatusType::Pending | OrderStatusType::Confirmed => {},
        }
        let transition = self.transition(&order, OrderStatusType::Cancelled, Actor::Customer).await?;
        Ok(transition.order)
    }

    /// Changes the order status from the merchant dashboard.
    ///
    /// | From \ To  | Confirmed        | Cancelled         | Delivered |
    /// |------------|------------------|-------------------|-----------|
    /// | Pending    | stock deducted   | no stock effect   | Err       |
    /// | Confirmed  | NoOp             | stock returned    | ok        |
    /// | Cancelled  | Err              | NoOp              | Err       |
    /// | Delivered  | Err              | Err               | NoOp      |
    pub async fn update_status_for_merchant(
        &self,
        organization_id: i64,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if order.organization_id != organization_id {
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} belongs to another merchant")));
        }
        if order.status == new_status {
            return Err(OrderFlowError::NoOp(new_status));
        }
        if !order.status.can_transition_to(new_status) {
            return Err(OrderFlowError::IllegalTransition { from: order.status, to: new_status });
        }
        let transition = self.transition(&order, new_status, Actor::Merchant).await?;
        Ok(transition.order)
    }

    pub async fn fetch_order_for_user(&self, user_id: &str, order_id: i64) -> Result<OrderWithItems, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} belongs to another customer")));
        }
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        Ok(self.db.fetch_orders_for_user(user_id).await?)
    }

    /// The most recent notifications addressed to `user_id`, newest first.
    pub async fn notifications_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>, OrderFlowError> {
        Ok(self.db.fetch_notifications(user_id, limit).await?)
    }

    /// Performs the guarded status change and the fan-out that follows it.
    ///
    /// If another request changed the order first, the order is re-read and the caller gets "already {status}".
    async fn transition(
        &self,
        order: &Order,
        to: OrderStatusType,
        actor: Actor,
    ) -> Result<OrderTransition, OrderFlowError> {
        let Some(transition) = self.db.transition_order(order.id, order.status, to).await? else {
            let current = self.db.fetch_order(order.id).await?.ok_or(OrderFlowError::OrderNotFound(order.id))?;
            info!("📦️ {current} changed while we were working on it. It is now {}", current.status);
            return Err(OrderFlowError::AlreadyProcessed(current.status));
        };
        info!("📦️ {} is now {to} (was {})", transition.order, transition.old_status);
        self.notify_status_change(&transition.order, actor).await;
        let event = OrderStatusChangedEvent::new(transition.order.clone(), transition.old_status);
        self.producers.publish_order_status_changed(event).await;
        Ok(transition)
    }

    async fn notify_status_change(&self, order: &Order, actor: Actor) {
        let (kind, title) = match order.status {
            OrderStatusType::Confirmed => (NotificationKind::OrderConfirmed, "Order confirmed"),
            OrderStatusType::Cancelled => (NotificationKind::OrderCancelled, "Order cancelled"),
            OrderStatusType::Delivered => (NotificationKind::OrderDelivered, "Order delivered"),
            OrderStatusType::Pending => return,
        };
        let message = format!("Order #{} is now {}.", order.order_number, order.status);
        let recipient = match actor {
            Actor::Merchant => Some(order.user_id.clone()),
            Actor::Customer => match self.db.fetch_organization(order.organization_id).await {
                Ok(org) => org.map(|o| o.owner_id),
                Err(e) => {
                    warn!("📦️ Could not look up merchant #{} to notify them: {e}", order.organization_id);
                    None
                },
            },
        };
        if let Some(user_id) = recipient {
            let notification = NewNotification::new(user_id, kind, title, message).for_organization(order.organization_id);
            notify(&self.db, notification).await;
        }
    }
}
