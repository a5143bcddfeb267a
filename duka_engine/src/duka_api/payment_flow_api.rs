use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        Money,
        NewNotification,
        NewPayment,
        NotificationKind,
        OrderStatusType,
        Payment,
        PaymentKind,
        PaymentStatus,
        PlanName,
    },
    duka_api::{
        errors::PaymentFlowError,
        fees::FeeSchedule,
        notifier::notify,
        payment_objects::{PaymentInitiated, SettlementNotice, SettlementOutcome, WebhookOutcome},
        plans::plan,
    },
    events::{EventProducers, OrderPaidEvent, PaymentSettledEvent, SubscriptionActivatedEvent},
    helpers::normalize_phone_number,
    traits::{
        NotificationManagement,
        OrderManagement,
        PaymentManagement,
        PaymentProvider,
        SettledPayment,
        WalletBalance,
    },
};

/// `PaymentFlowApi` moves money through the mobile-money provider and settles the results.
///
/// There is exactly one settlement path, [`PaymentFlowApi::settle_payment`]. Polling and webhooks both feed into it,
/// and the storage layer guarantees that only one caller moves a payment out of `pending`. Only that caller performs
/// side effects, so replays and races between the poll and the webhook are harmless.
pub struct PaymentFlowApi<B, P> {
    db: B,
    provider: P,
    producers: EventProducers,
    fees: FeeSchedule,
}

impl<B, P> Debug for PaymentFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi ({:?})", self.fees)
    }
}

impl<B, P> PaymentFlowApi<B, P> {
    pub fn new(db: B, provider: P, producers: EventProducers) -> Self {
        Self { db, provider, producers, fees: FeeSchedule::default() }
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn fees(&self) -> FeeSchedule {
        self.fees
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> PaymentFlowApi<B, P>
where
    B: OrderManagement + PaymentManagement + NotificationManagement,
    P: PaymentProvider,
{
    /// Asks the customer's wallet to pay for an order. The customer approves the charge on their handset, and the
    /// result arrives later through [`Self::poll_payment_status`] or the provider's webhook.
    pub async fn initiate_order_payment(
        &self,
        user_id: &str,
        order_id: i64,
        phone: &str,
    ) -> Result<PaymentInitiated, PaymentFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(PaymentFlowError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(PaymentFlowError::Forbidden(format!("Order {order_id} belongs to another customer")));
        }
        if order.paid {
            return Err(PaymentFlowError::AlreadyPaid(order_id));
        }
        if order.status == OrderStatusType::Cancelled {
            return Err(PaymentFlowError::OrderCancelled(order_id));
        }
        if !order.total_price.is_positive() {
            return Err(PaymentFlowError::InvalidRequest(format!("Order {order_id} has nothing to pay")));
        }
        let phone = normalize_phone_number(phone).ok_or_else(|| PaymentFlowError::InvalidPhoneNumber(phone.into()))?;
        let quote = self.fees.quote(order.total_price).ok_or_else(|| {
            PaymentFlowError::InvalidRequest(format!("Order {order_id} is too large to pay in one transaction"))
        })?;
        let tx = self.provider.cash_in(&phone, quote.total).await?;
        let payment = NewPayment {
            user_id: user_id.to_string(),
            organization_id: order.organization_id,
            phone_number: phone,
            amount: quote.total,
            base_amount: quote.base_amount,
            provider_fee: quote.provider_fee,
            platform_fee: quote.platform_fee,
            kind: PaymentKind::CashIn,
            plan_name: None,
            provider_ref: tx.reference,
            order_id: Some(order_id),
        };
        let payment = self.db.insert_payment(payment).await?;
        info!("💰️ Payment [{}] of {} requested for {order}", payment.provider_ref, payment.amount);
        Ok(PaymentInitiated::from(&payment))
    }

    /// Reports the status of a payment, settling it if the provider has a final answer.
    ///
    /// Provider trouble is not the customer's problem: if the provider cannot be reached the payment is reported as
    /// still pending and the client keeps polling.
    pub async fn poll_payment_status(
        &self,
        user_id: &str,
        order_id: i64,
        provider_ref: &str,
    ) -> Result<PaymentStatus, PaymentFlowError> {
        let payment = self
            .db
            .fetch_payment_by_ref(provider_ref)
            .await?
            .ok_or_else(|| PaymentFlowError::PaymentNotFound(provider_ref.to_string()))?;
        if payment.user_id != user_id {
            return Err(PaymentFlowError::Forbidden(format!("Payment [{provider_ref}] belongs to another customer")));
        }
        if payment.order_id != Some(order_id) {
            return Err(PaymentFlowError::InvalidRequest(format!(
                "Payment [{provider_ref}] is not for order {order_id}"
            )));
        }
        if payment.status.is_terminal() {
            return Ok(payment.status);
        }
        let status = match self.provider.latest_status(provider_ref).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                trace!("💰️ No provider events for [{provider_ref}] yet");
                return Ok(PaymentStatus::Pending);
            },
            Err(e) => {
                warn!("💰️ Could not reach the payment provider while polling [{provider_ref}]. {e}");
                return Ok(PaymentStatus::Pending);
            },
        };
        if !status.is_terminal() {
            return Ok(PaymentStatus::Pending);
        }
        let notice = SettlementNotice::new(provider_ref, payment.kind, status);
        let result = match self.settle_payment(notice).await? {
            SettlementOutcome::Settled(settled) => settled.payment.status,
            SettlementOutcome::AlreadyProcessed(payment) => payment.status,
            SettlementOutcome::NotFound => PaymentStatus::Pending,
        };
        Ok(result)
    }

    /// Handles a provider callback. Non-final statuses are acknowledged without touching anything.
    pub async fn settle_from_webhook(&self, notice: SettlementNotice) -> Result<WebhookOutcome, PaymentFlowError> {
        if !notice.status.is_terminal() {
            debug!("💰️ Webhook for [{}] reports {}. Nothing to do.", notice.provider_ref, notice.status);
            return Ok(WebhookOutcome::Ignored);
        }
        let outcome = match self.settle_payment(notice).await? {
            SettlementOutcome::NotFound => WebhookOutcome::NotFound,
            SettlementOutcome::AlreadyProcessed(_) => WebhookOutcome::AlreadyProcessed,
            SettlementOutcome::Settled(_) => WebhookOutcome::Processed,
        };
        Ok(outcome)
    }

    /// Moves a pending payment to its final status and performs the follow-up work, exactly once.
    ///
    /// | Kind    | Status     | Follow-up                                                                  |
    /// |---------|------------|----------------------------------------------------------------------------|
    /// | CASHIN  | successful | plan payment: subscription activated; order payment: order marked paid      |
    /// | CASHIN  | failed     | payer notified                                                             |
    /// | CASHOUT | successful | merchant notified of the completed withdrawal                              |
    /// | CASHOUT | failed     | merchant notified. The funds count towards the wallet balance again        |
    pub async fn settle_payment(&self, notice: SettlementNotice) -> Result<SettlementOutcome, PaymentFlowError> {
        if !notice.status.is_terminal() {
            return Err(PaymentFlowError::InvalidRequest(format!(
                "Cannot settle payment [{}] as {}",
                notice.provider_ref, notice.status
            )));
        }
        let Some(current) = self.db.fetch_payment_by_ref(&notice.provider_ref).await? else {
            info!("💰️ Settlement for unknown payment [{}] ignored", notice.provider_ref);
            return Ok(SettlementOutcome::NotFound);
        };
        if current.kind != notice.kind {
            warn!(
                "💰️ Provider reported [{}] as {}, but it was stored as {}. Using the stored kind.",
                notice.provider_ref, notice.kind, current.kind
            );
        }
        let Some(settled) = self.db.settle_payment(&notice.provider_ref, notice.status, Utc::now()).await? else {
            let payment = self.db.fetch_payment_by_ref(&notice.provider_ref).await?.unwrap_or(current);
            debug!("💰️ Payment [{}] was already settled as {}", payment.provider_ref, payment.status);
            return Ok(SettlementOutcome::AlreadyProcessed(payment));
        };
        info!("💰️ Payment [{}] ({}) settled as {}", settled.payment.provider_ref, settled.payment.kind, notice.status);
        self.after_settlement(&settled).await;
        Ok(SettlementOutcome::Settled(settled))
    }

    async fn after_settlement(&self, settled: &SettledPayment) {
        let payment = &settled.payment;
        match (payment.kind, payment.status) {
            (PaymentKind::CashIn, PaymentStatus::Successful) => {
                if let Some(subscription) = &settled.subscription {
                    let message = format!(
                        "Your {} plan is active until {}.",
                        subscription.plan_name,
                        subscription.current_period_end.format("%Y-%m-%d")
                    );
                    self.notify_merchant(payment, NotificationKind::SubscriptionActivated, "Subscription active", message)
                        .await;
                    let event = SubscriptionActivatedEvent::new(subscription.clone());
                    self.producers.publish_subscription_activated(event).await;
                } else if let Some(order) = &settled.order {
                    let message = format!("Payment of {} for order #{} was received.", payment.amount, order.order_number);
                    let customer = NewNotification::new(&order.user_id, NotificationKind::OrderPaid, "Payment received", &message)
                        .for_organization(order.organization_id);
                    notify(&self.db, customer).await;
                    let message = format!("Order #{} has been paid ({}).", order.order_number, payment.base_amount);
                    self.notify_merchant(payment, NotificationKind::OrderPaid, "Order paid", message).await;
                    self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), payment.clone())).await;
                }
            },
            (PaymentKind::CashIn, PaymentStatus::Failed) => {
                let message = format!("Your payment of {} did not go through.", payment.amount);
                let n = NewNotification::new(&payment.user_id, NotificationKind::PaymentFailed, "Payment failed", message)
                    .for_organization(payment.organization_id);
                notify(&self.db, n).await;
            },
            (PaymentKind::CashOut, PaymentStatus::Successful) => {
                let message = format!("{} was sent to {}.", payment.amount, payment.phone_number);
                let n = NewNotification::new(
                    &payment.user_id,
                    NotificationKind::WithdrawalCompleted,
                    "Withdrawal completed",
                    message,
                )
                .for_organization(payment.organization_id);
                notify(&self.db, n).await;
            },
            (PaymentKind::CashOut, PaymentStatus::Failed) => {
                let message = format!("Your withdrawal of {} failed. The funds are still in your wallet.", payment.amount);
                let n =
                    NewNotification::new(&payment.user_id, NotificationKind::WithdrawalFailed, "Withdrawal failed", message)
                        .for_organization(payment.organization_id);
                notify(&self.db, n).await;
            },
            (_, PaymentStatus::Pending) => {
                warn!("💰️ Payment [{}] was settled as pending. This should not happen.", payment.provider_ref);
                return;
            },
        }
        self.producers.publish_payment_settled(PaymentSettledEvent::new(payment.clone())).await;
    }

    async fn notify_merchant(&self, payment: &Payment, kind: NotificationKind, title: &str, message: String) {
        match self.db.fetch_organization(payment.organization_id).await {
            Ok(Some(org)) => {
                let n = NewNotification::new(org.owner_id, kind, title, message).for_organization(org.id);
                notify(&self.db, n).await;
            },
            Ok(None) => warn!("💰️ Merchant #{} no longer exists. Notification dropped.", payment.organization_id),
            Err(e) => warn!("💰️ Could not look up merchant #{} to notify them. {e}", payment.organization_id),
        }
    }

    /// Asks the merchant's wallet to pay for a month of `plan_name`. The subscription starts when the payment settles.
    pub async fn initiate_subscription_payment(
        &self,
        user_id: &str,
        organization_id: i64,
        plan_name: &str,
        phone: &str,
    ) -> Result<PaymentInitiated, PaymentFlowError> {
        let name = plan_name.parse::<PlanName>().map_err(|_| PaymentFlowError::UnknownPlan(plan_name.to_string()))?;
        let plan = plan(name);
        if !plan.monthly_price.is_positive() {
            return Err(PaymentFlowError::InvalidRequest(format!("The {name} plan does not need a payment")));
        }
        if self.db.fetch_organization(organization_id).await?.is_none() {
            return Err(PaymentFlowError::Forbidden(format!("Merchant {organization_id} does not exist")));
        }
        let phone = normalize_phone_number(phone).ok_or_else(|| PaymentFlowError::InvalidPhoneNumber(phone.into()))?;
        let quote = self.fees.quote(plan.monthly_price).ok_or_else(|| {
            PaymentFlowError::InvalidRequest(format!("The {name} plan price is too large to pay in one transaction"))
        })?;
        let tx = self.provider.cash_in(&phone, quote.total).await?;
        let payment = NewPayment {
            user_id: user_id.to_string(),
            organization_id,
            phone_number: phone,
            amount: quote.total,
            base_amount: quote.base_amount,
            provider_fee: quote.provider_fee,
            platform_fee: quote.platform_fee,
            kind: PaymentKind::CashIn,
            plan_name: Some(name),
            provider_ref: tx.reference,
            order_id: None,
        };
        let payment = self.db.insert_payment(payment).await?;
        info!("💰️ Subscription payment [{}] for the {name} plan requested by merchant #{organization_id}", payment.provider_ref);
        Ok(PaymentInitiated::from(&payment))
    }

    pub async fn wallet_balance(&self, organization_id: i64) -> Result<WalletBalance, PaymentFlowError> {
        Ok(self.db.fetch_wallet_balance(organization_id).await?)
    }

    /// Sends `amount` from the merchant's wallet to their mobile-money number.
    ///
    /// The balance check and the insert are not atomic. Two simultaneous withdrawals can both pass the check; the
    /// provider's own balance is the final guard.
    pub async fn request_withdrawal(
        &self,
        user_id: &str,
        organization_id: i64,
        amount: Money,
        phone: &str,
    ) -> Result<PaymentInitiated, PaymentFlowError> {
        if !amount.is_positive() {
            return Err(PaymentFlowError::InvalidRequest("Withdrawal amount must be positive".into()));
        }
        let phone = normalize_phone_number(phone).ok_or_else(|| PaymentFlowError::InvalidPhoneNumber(phone.into()))?;
        let wallet = self.db.fetch_wallet_balance(organization_id).await?;
        if wallet.balance < amount {
            return Err(PaymentFlowError::InsufficientBalance { available: wallet.balance, requested: amount });
        }
        let tx = self.provider.cash_out(&phone, amount).await?;
        let payment = NewPayment {
            user_id: user_id.to_string(),
            organization_id,
            phone_number: phone,
            amount,
            base_amount: amount,
            provider_fee: Money::default(),
            platform_fee: Money::default(),
            kind: PaymentKind::CashOut,
            plan_name: None,
            provider_ref: tx.reference,
            order_id: None,
        };
        let payment = self.db.insert_payment(payment).await?;
        info!("💰️ Withdrawal [{}] of {amount} requested by merchant #{organization_id}", payment.provider_ref);
        Ok(PaymentInitiated::from(&payment))
    }
}
