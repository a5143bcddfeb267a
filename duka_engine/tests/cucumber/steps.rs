use cucumber::{then, when};
use duka_engine::{
    db_types::{NotificationKind, OrderStatusType, PaymentKind, PaymentStatus, StockChangeType},
    order_objects::NewOrderRequest,
    payment_objects::SettlementNotice,
    traits::Pagination,
    OrderManagement,
    StockManagement,
    SubscriptionManagement,
};

use crate::{
    cucumber::DukaWorld,
    support::seed::{count_notifications, expire_token, stock_of},
};

/// Parses carts written as `3 Beans, 1 Coffee`.
fn parse_cart(world: &DukaWorld, cart: &str) -> NewOrderRequest {
    cart.split(',').map(str::trim).fold(NewOrderRequest::default(), |request, line| {
        let (qty, name) = line.split_once(' ').unwrap_or_else(|| panic!("Invalid cart line: {line}"));
        let qty = qty.parse::<i64>().unwrap_or_else(|_| panic!("Invalid quantity in: {line}"));
        request.with_item(world.product(name.trim()), qty)
    })
}

#[when(expr = "'{word}' orders {string}")]
async fn place_order(world: &mut DukaWorld, customer: String, cart: String) {
    let request = parse_cart(world, &cart);
    match world.system().orders.create_order(&customer, request).await {
        Ok(created) => {
            world.last_order = Some(created);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when("the merchant confirms the order")]
async fn confirm(world: &mut DukaWorld) {
    let token = world.order().confirmation_token().map(String::from);
    world.last_error = world.system().orders.confirm_by_token(token.as_deref()).await.err().map(|e| e.to_string());
}

#[when("the merchant rejects the order")]
async fn reject(world: &mut DukaWorld) {
    let token = world.order().confirmation_token().map(String::from);
    world.last_error = world.system().orders.reject_by_token(token.as_deref()).await.err().map(|e| e.to_string());
}

#[when("the confirmation link expires")]
async fn link_expires(world: &mut DukaWorld) {
    expire_token(&world.system().db, &world.order().order).await;
}

#[when(expr = "'{word}' cancels the order")]
async fn customer_cancels(world: &mut DukaWorld, customer: String) {
    let id = world.order().order.id;
    world.last_error = world.system().orders.cancel_by_customer(&customer, id).await.err().map(|e| e.to_string());
}

#[when(expr = "'{word}' pays for the order from {string}")]
async fn pay_for_order(world: &mut DukaWorld, customer: String, phone: String) {
    let id = world.order().order.id;
    match world.system().payments.initiate_order_payment(&customer, id, &phone).await {
        Ok(payment) => world.last_payment = Some(payment),
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "'{word}' pays for the {word} plan of '{word}' from {string}")]
async fn pay_for_plan(world: &mut DukaWorld, owner: String, plan: String, merchant: String, phone: String) {
    let org = world.merchant(&merchant);
    match world.system().payments.initiate_subscription_payment(&owner, org, &plan, &phone).await {
        Ok(payment) => world.last_payment = Some(payment),
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "the provider reports the payment as {word} {int} time(s)")]
async fn webhook(world: &mut DukaWorld, status: String, times: usize) {
    let status = match status.as_str() {
        "successful" => PaymentStatus::Successful,
        "failed" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    };
    let reference = world.last_payment.as_ref().expect("No payment was initiated").paypack_ref.clone();
    for _ in 0..times {
        let notice = SettlementNotice::new(reference.as_str(), PaymentKind::CashIn, status);
        world.system().payments.settle_from_webhook(notice).await.expect("Error handling webhook");
    }
}

#[when(expr = "the provider feed reports the payment as {word}")]
async fn provider_feed(world: &mut DukaWorld, status: String) {
    let status = if status == "successful" { PaymentStatus::Successful } else { PaymentStatus::Failed };
    let payment = world.last_payment.as_ref().expect("No payment was initiated");
    world.system().provider.report(&payment.paypack_ref, status);
}

#[when(expr = "'{word}' polls the payment status")]
async fn poll(world: &mut DukaWorld, customer: String) {
    let id = world.order().order.id;
    let reference = world.last_payment.as_ref().expect("No payment was initiated").paypack_ref.clone();
    world.system().payments.poll_payment_status(&customer, id, &reference).await.expect("Error polling");
}

#[then(expr = "the order total is {int} RWF")]
async fn order_total(world: &mut DukaWorld, total: i64) {
    assert_eq!(world.order().order.total_price.value(), total);
}

#[then(expr = "the order number is {int}")]
async fn order_number(world: &mut DukaWorld, number: i64) {
    assert_eq!(world.order().order.order_number, number);
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut DukaWorld, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Invalid status");
    let order = world.system().db.fetch_order(world.order().order.id).await.unwrap().expect("Order is missing");
    assert_eq!(order.status, expected);
}

#[then("the order has been paid")]
async fn order_paid(world: &mut DukaWorld) {
    let order = world.system().db.fetch_order(world.order().order.id).await.unwrap().expect("Order is missing");
    assert!(order.paid, "{order} should be paid");
}

#[then(expr = "the stock of '{word}' is {int}")]
async fn stock_level(world: &mut DukaWorld, product: String, stock: i64) {
    assert_eq!(stock_of(&world.system().db, world.product(&product)).await, stock);
}

#[then(expr = "the latest stock entry for '{word}' is a {word} of {int}")]
async fn latest_entry(world: &mut DukaWorld, product: String, kind: String, change: i64) {
    let history =
        world.system().db.fetch_stock_history(world.product(&product), Pagination::default()).await.unwrap();
    let entry = history.entries.first().expect("No stock history");
    assert_eq!(entry.change_type.to_string(), kind);
    assert_eq!(entry.quantity_change, change);
}

#[then(expr = "'{word}' has no stock history")]
async fn no_history(world: &mut DukaWorld, product: String) {
    let history =
        world.system().db.fetch_stock_history(world.product(&product), Pagination::default()).await.unwrap();
    assert_eq!(history.total, 0, "Unexpected entries: {:?}", history.entries);
}

#[then(expr = "'{word}' has {int} sale entries")]
async fn sale_entries(world: &mut DukaWorld, product: String, count: usize) {
    let history =
        world.system().db.fetch_stock_history(world.product(&product), Pagination::default()).await.unwrap();
    assert_eq!(history.entries.iter().filter(|e| e.change_type == StockChangeType::Sale).count(), count);
}

#[then(expr = "the last error is {string}")]
async fn last_error(world: &mut DukaWorld, message: String) {
    assert_eq!(world.last_error.as_deref(), Some(message.as_str()));
}

#[then(expr = "'{word}' has {int} {word} notification(s)")]
async fn notifications(world: &mut DukaWorld, user: String, count: usize, kind: String) {
    let kind = serde_json::from_value::<NotificationKind>(serde_json::Value::String(kind)).expect("Unknown kind");
    assert_eq!(count_notifications(&world.system().db, &user, kind).await, count);
}

#[then(expr = "'{word}' is on the {word} plan for one month")]
async fn one_period(world: &mut DukaWorld, merchant: String, plan: String) {
    let sub = world.system().db.fetch_subscription(world.merchant(&merchant)).await.unwrap().expect("No subscription");
    assert_eq!(sub.plan_name.to_string(), plan);
    let days = (sub.current_period_end - sub.current_period_start).num_days();
    assert!((28..=31).contains(&days), "Subscription period is {days} days");
}
