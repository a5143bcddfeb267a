use actix_web::{
    http::StatusCode,
    test::TestRequest,
    web::{self, ServiceConfig},
};
use chrono::{Duration, TimeZone, Utc};
use duka_common::Money;
use duka_engine::{
    db_types::{OrderItem, OrderStatusType, Organization, Product, ProductCategory},
    events::EventProducers,
    traits::OrderTransition,
    OrderFlowApi,
    StorageError,
};
use serde_json::Value;

use super::{
    helpers::{add_common_data, customer_token, merchant_token, order, redirect_location, send, with_auth},
    mocks::MockDukaStore,
};
use crate::routes::{
    confirm_page_without_token,
    health,
    CancelOrderRoute,
    ConfirmOrderRoute,
    ConfirmPageRoute,
    MyOrdersRoute,
    PlaceOrderRoute,
    RejectPageRoute,
    UpdateOrderStatusRoute,
};

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::get().uri("/health"), |cfg| {
        cfg.service(health);
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

//----------------------------------------   Confirmation pages   ------------------------------------------------

#[actix_web::test]
async fn confirm_page_redirects_to_the_app() {
    let _ = env_logger::try_init().ok();
    let (status, location) = redirect_location(TestRequest::get().uri("/orders/confirm/tok3n"), configure_pending_order)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, "https://app.duka.test/orders/confirm?token=tok3n");
}

#[actix_web::test]
async fn reject_page_redirects_to_the_app() {
    let _ = env_logger::try_init().ok();
    let (status, location) = redirect_location(TestRequest::get().uri("/orders/reject/tok3n"), configure_pending_order)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, "https://app.duka.test/orders/reject?token=tok3n");
}

#[actix_web::test]
async fn confirm_page_with_expired_token() {
    let _ = env_logger::try_init().ok();
    let (status, location) = redirect_location(TestRequest::get().uri("/orders/confirm/tok3n"), configure_expired_token)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, "https://app.duka.test/orders/status?action=confirm&error=expired-token");
}

#[actix_web::test]
async fn confirm_page_for_an_order_that_was_already_confirmed() {
    let _ = env_logger::try_init().ok();
    let (_, location) = redirect_location(TestRequest::get().uri("/orders/confirm/tok3n"), configure_confirmed_order)
        .await
        .expect("Request failed");
    assert_eq!(location, "https://app.duka.test/orders/status?action=confirm&status=confirmed");
}

#[actix_web::test]
async fn confirm_page_with_unknown_token() {
    let _ = env_logger::try_init().ok();
    let (_, location) = redirect_location(TestRequest::get().uri("/orders/reject/nope"), configure_unknown_token)
        .await
        .expect("Request failed");
    assert_eq!(location, "https://app.duka.test/orders/status?action=reject&error=invalid-token");
}

#[actix_web::test]
async fn confirm_page_with_storage_failure() {
    let _ = env_logger::try_init().ok();
    let (_, location) = redirect_location(TestRequest::get().uri("/orders/confirm/tok3n"), configure_broken_store)
        .await
        .expect("Request failed");
    assert_eq!(location, "https://app.duka.test/orders/status?action=confirm&error=server-error");
}

#[actix_web::test]
async fn confirm_page_without_a_token() {
    let _ = env_logger::try_init().ok();
    let (status, location) = redirect_location(TestRequest::get().uri("/orders/confirm"), |cfg| {
        add_common_data(cfg);
        cfg.service(confirm_page_without_token);
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location, "https://app.duka.test/orders/status?action=confirm&error=missing-token");
}

#[actix_web::test]
async fn confirm_order_with_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        send(TestRequest::post().uri("/orders/confirm/tok3n"), configure_pending_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["orderId"], 1);
    assert_eq!(json["orderNumber"], 101);
}

#[actix_web::test]
async fn confirm_order_with_expired_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        send(TestRequest::post().uri("/orders/confirm/tok3n"), configure_expired_token).await.expect("Request failed");
    assert_eq!(status, StatusCode::GONE);
    assert!(body.starts_with(r#"{"error":"#));
}

#[actix_web::test]
async fn confirm_order_twice() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        send(TestRequest::post().uri("/orders/confirm/tok3n"), configure_confirmed_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("confirmed"));
}

//----------------------------------------   Customer orders   ---------------------------------------------------

#[actix_web::test]
async fn fetch_my_orders_without_a_session() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::get().uri("/mobile/orders"), configure_customer_orders)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.starts_with(r#"{"error":"#));
}

#[actix_web::test]
async fn fetch_my_orders_with_a_tampered_session() {
    let _ = env_logger::try_init().ok();
    let mut token = customer_token("alice");
    token.insert(0, 'm');
    let req = with_auth(TestRequest::get().uri("/mobile/orders"), &token);
    let (status, _) = send(req, configure_customer_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::get().uri("/mobile/orders"), &customer_token("alice"));
    let (status, body) = send(req, configure_customer_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["orderNumber"], 101);
    // Tokens are for merchants only
    assert!(orders[0].get("confirmationToken").is_none());
}

#[actix_web::test]
async fn cancel_someone_elses_order() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/mobile/orders/1/cancel"), &customer_token("mallory"));
    let (status, _) = send(req, configure_customer_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn place_order() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/mobile/orders"), &customer_token("alice"))
        .set_json(serde_json::json!({ "items": [{ "productId": 11, "quantity": 2 }], "notes": "Ring the bell" }));
    let (status, body) = send(req, configure_new_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["orderId"], 1);
    assert_eq!(json["orderNumber"], 101);
    assert_eq!(json["stockWarnings"].as_array().unwrap().len(), 1);
    let whatsapp = json["whatsappUrl"].as_str().unwrap();
    assert!(whatsapp.starts_with("https://wa.me/250788000111?text="));
    assert!(whatsapp.contains("tok3n"));
}

#[actix_web::test]
async fn place_empty_order() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/mobile/orders"), &customer_token("alice"))
        .set_json(serde_json::json!({ "items": [] }));
    let (status, _) = send(req, configure_new_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

//----------------------------------------   Merchant   ----------------------------------------------------------

#[actix_web::test]
async fn customers_cannot_update_order_status() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::patch().uri("/merchant/orders/1/status"), &customer_token("alice"))
        .set_json(serde_json::json!({ "status": "delivered" }));
    let (status, _) = send(req, configure_customer_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn merchants_cannot_skip_confirmation() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::patch().uri("/merchant/orders/1/status"), &merchant_token("bob", 7))
        .set_json(serde_json::json!({ "status": "delivered" }));
    let (status, body) = send(req, configure_customer_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"#));
}

#[actix_web::test]
async fn merchants_only_see_their_own_orders() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::patch().uri("/merchant/orders/1/status"), &merchant_token("eve", 8))
        .set_json(serde_json::json!({ "status": "confirmed" }));
    let (status, _) = send(req, configure_customer_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

//----------------------------------------   Configuration   -----------------------------------------------------

fn register_order_routes(cfg: &mut ServiceConfig, store: MockDukaStore) {
    add_common_data(cfg);
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(ConfirmPageRoute::<MockDukaStore>::new())
        .service(RejectPageRoute::<MockDukaStore>::new())
        .service(ConfirmOrderRoute::<MockDukaStore>::new())
        .service(PlaceOrderRoute::<MockDukaStore>::new())
        .service(MyOrdersRoute::<MockDukaStore>::new())
        .service(CancelOrderRoute::<MockDukaStore>::new())
        .service(UpdateOrderStatusRoute::<MockDukaStore>::new())
        .app_data(web::Data::new(api));
}

fn quiet_notifications(store: &mut MockDukaStore) {
    store.expect_insert_notification().returning(|_| Err(StorageError::DatabaseError("not stored in tests".into())));
    store.expect_fetch_organization().returning(|id| Ok(Some(organization(id))));
}

fn configure_pending_order(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_order_by_token().returning(|_| Ok(Some(order(1, "alice", OrderStatusType::Pending))));
    store.expect_transition_order().returning(|id, from, to| {
        let mut confirmed = order(id, "alice", to);
        confirmed.confirmed_at = Some(Utc::now());
        Ok(Some(OrderTransition { order: confirmed, old_status: from, stock_changes: vec![] }))
    });
    quiet_notifications(&mut store);
    register_order_routes(cfg, store);
}

fn configure_expired_token(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_order_by_token().returning(|_| {
        let mut expired = order(1, "alice", OrderStatusType::Pending);
        expired.token_expires_at = Some(Utc::now() - Duration::minutes(1));
        Ok(Some(expired))
    });
    register_order_routes(cfg, store);
}

fn configure_confirmed_order(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_order_by_token().returning(|_| Ok(Some(order(1, "alice", OrderStatusType::Confirmed))));
    register_order_routes(cfg, store);
}

fn configure_unknown_token(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_order_by_token().returning(|_| Ok(None));
    register_order_routes(cfg, store);
}

fn configure_broken_store(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_order_by_token().returning(|_| Err(StorageError::DatabaseError("disk on fire".into())));
    register_order_routes(cfg, store);
}

fn configure_customer_orders(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_orders_for_user().returning(|user| {
        Ok(vec![order(1, user, OrderStatusType::Pending), order(2, user, OrderStatusType::Delivered)])
    });
    store.expect_fetch_order().returning(|id| Ok(Some(order(id, "alice", OrderStatusType::Pending))));
    register_order_routes(cfg, store);
}

fn configure_new_order(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_products().returning(|ids| Ok(ids.iter().map(|id| product(*id)).collect()));
    store.expect_fetch_subscription().returning(|_| Ok(None));
    store.expect_count_orders_since().returning(|_, _| Ok(3));
    store.expect_insert_order().returning(|new_order| {
        let mut placed = order(1, &new_order.user_id, OrderStatusType::Pending);
        placed.total_price = new_order.total_price;
        let items = new_order
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| OrderItem {
                id: i as i64 + 1,
                order_id: 1,
                product_id: item.product_id,
                quantity: item.quantity,
                price_at_order: item.price_at_order,
                subtotal: item.subtotal,
                notes: item.notes.clone(),
            })
            .collect();
        Ok((placed, items))
    });
    quiet_notifications(&mut store);
    register_order_routes(cfg, store);
}

fn organization(id: i64) -> Organization {
    Organization {
        id,
        name: "Kigali Fresh".into(),
        owner_id: "bob".into(),
        metadata: r#"{"whatsappNumber": "+250 788 000 111"}"#.into(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn product(id: i64) -> Product {
    let created_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    Product {
        id,
        organization_id: 7,
        name: "Avocado".into(),
        category: ProductCategory::Standard,
        price: Money::from(2_500),
        visit_fee: None,
        landlord_owned: false,
        track_inventory: true,
        stock: 1,
        created_at,
        updated_at: created_at,
    }
}
