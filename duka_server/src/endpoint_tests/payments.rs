use actix_web::{
    http::StatusCode,
    test::TestRequest,
    web::{self, ServiceConfig},
};
use chrono::{TimeZone, Utc};
use duka_common::{Money, Secret};
use duka_engine::{
    db_types::{NewPayment, OrderStatusType, Payment, PaymentKind, PaymentStatus},
    events::EventProducers,
    traits::{ProviderError, ProviderTransaction, StorageError, WalletBalance},
    FeeSchedule,
    PaymentFlowApi,
};
use paypack_tools::helpers::{calculate_signature, SIGNATURE_HEADER};
use serde_json::Value;

use super::{
    helpers::{add_common_data, customer_token, merchant_token, order, send, with_auth},
    mocks::{MockDukaStore, MockProvider},
};
use crate::{
    middleware::WebhookSignatureMiddlewareFactory,
    routes::{PayForOrderRoute, PaymentStatusRoute, PaypackWebhookRoute, WalletRoute, WithdrawRoute},
};

const WEBHOOK_SECRET: &str = "paypack-webhook-secret";

const WEBHOOK_BODY: &str = r#"{
    "event_id": "ad8ef8a0-5555-11ed-9a38-dead1a13f8f1",
    "event_kind": "transaction:processed",
    "created_at": "2024-06-01T09:35:00Z",
    "data": {
        "ref": "unknown-ref",
        "kind": "CASHIN",
        "amount": 5165,
        "client": "0788123456",
        "status": "successful"
    }
}"#;

const PENDING_WEBHOOK_BODY: &str =
    r#"{"data": {"ref": "pp-ref-1", "kind": "CASHIN", "amount": 5165, "status": "pending"}}"#;

//----------------------------------------   Order payments   ----------------------------------------------------

#[actix_web::test]
async fn pay_for_order() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/mobile/orders/1/pay"), &customer_token("alice"))
        .set_json(serde_json::json!({ "phoneNumber": "+250 788 123 456" }));
    let (status, body) = send(req, configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["paypackRef"], "pp-ref-1");
    // 5000 + 2.3% provider fee + 1% platform fee
    assert_eq!(json["amount"], 5165);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["pollTimeoutSecs"], 120);
}

#[actix_web::test]
async fn pay_with_a_bad_phone_number() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/mobile/orders/1/pay"), &customer_token("alice"))
        .set_json(serde_json::json!({ "phoneNumber": "12345" }));
    let (status, body) = send(req, configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("not a valid mobile money number"));
}

#[actix_web::test]
async fn provider_failures_are_bad_gateway() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/mobile/orders/1/pay"), &customer_token("alice"))
        .set_json(serde_json::json!({ "phoneNumber": "0788123456" }));
    let (status, _) = send(req, configure_provider_down).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn poll_pending_payment_while_provider_is_down() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::get().uri("/mobile/orders/1/payment-status?ref=pp-ref-1"), &customer_token("alice"));
    let (status, body) = send(req, configure_provider_down).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"pending"}"#);
}

#[actix_web::test]
async fn poll_someone_elses_payment() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::get().uri("/mobile/orders/1/payment-status?ref=pp-ref-1"), &customer_token("eve"));
    let (status, _) = send(req, configure_provider_down).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

//----------------------------------------   Wallet   ------------------------------------------------------------

#[actix_web::test]
async fn wallet_balance() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::get().uri("/merchant/wallet"), &merchant_token("bob", 7));
    let (status, body) = send(req, configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"balance":12000,"pendingWithdrawals":3000}"#);
}

#[actix_web::test]
async fn customers_have_no_wallet() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::get().uri("/merchant/wallet"), &customer_token("alice"));
    let (status, _) = send(req, configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn withdraw_more_than_the_balance() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/merchant/wallet/withdraw"), &merchant_token("bob", 7))
        .set_json(serde_json::json!({ "amount": 12001, "phoneNumber": "0788123456" }));
    let (status, body) = send(req, configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Insufficient balance"));
}

#[actix_web::test]
async fn withdraw() {
    let _ = env_logger::try_init().ok();
    let req = with_auth(TestRequest::post().uri("/merchant/wallet/withdraw"), &merchant_token("bob", 7))
        .set_json(serde_json::json!({ "amount": 12000, "phoneNumber": "0788123456" }));
    let (status, body) = send(req, configure_payments).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["paypackRef"], "pp-out-1");
    assert_eq!(json["amount"], 12000);
}

//----------------------------------------   Webhook   -----------------------------------------------------------

#[actix_web::test]
async fn webhook_for_unknown_payment_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook(WEBHOOK_BODY, &calculate_signature(WEBHOOK_SECRET, WEBHOOK_BODY.as_bytes()));
    let (status, body) = send(req, configure_webhook).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"notFound":true,"received":true}"#);
}

#[actix_web::test]
async fn webhook_with_pending_status_is_ignored() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook(PENDING_WEBHOOK_BODY, &calculate_signature(WEBHOOK_SECRET, PENDING_WEBHOOK_BODY.as_bytes()));
    let (status, body) = send(req, configure_webhook).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"processed":false,"received":true}"#);
}

#[actix_web::test]
async fn webhook_with_bad_signature() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook(WEBHOOK_BODY, &calculate_signature("not-the-secret", WEBHOOK_BODY.as_bytes()));
    let err = send(req, configure_webhook).await.expect_err("Expected error");
    assert!(err.contains("webhook signature"), "{err}");
}

#[actix_web::test]
async fn webhook_without_signature() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/webhooks/paypack")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(WEBHOOK_BODY);
    let err = send(req, configure_webhook).await.expect_err("Expected error");
    assert!(err.contains("webhook signature"), "{err}");
}

#[actix_web::test]
async fn signed_webhook_with_unreadable_body_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    for body in [r#"{"hello": "world"}"#, "not json at all", r#"{"data": {"ref": 42}}"#] {
        let req = signed_webhook(body, &calculate_signature(WEBHOOK_SECRET, body.as_bytes()));
        let (status, reply) = send(req, configure_webhook_without_storage).await.expect("Request failed");
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(reply, r#"{"processed":false,"received":true}"#);
    }
}

#[actix_web::test]
async fn webhook_lookup_failure_asks_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook(WEBHOOK_BODY, &calculate_signature(WEBHOOK_SECRET, WEBHOOK_BODY.as_bytes()));
    let (status, body) = send(req, configure_webhook_db_down).await.expect("Request failed");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("database is locked"), "{body}");
}

#[actix_web::test]
async fn webhook_settlement_failure_asks_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let req = signed_webhook(WEBHOOK_BODY, &calculate_signature(WEBHOOK_SECRET, WEBHOOK_BODY.as_bytes()));
    let (status, _) = send(req, configure_webhook_settle_fails).await.expect("Request failed");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

fn signed_webhook(body: &'static str, signature: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhooks/paypack")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature.to_string()))
        .set_payload(body)
}

//----------------------------------------   Configuration   -----------------------------------------------------

fn register_payment_routes(cfg: &mut ServiceConfig, store: MockDukaStore, provider: MockProvider) {
    add_common_data(cfg);
    let api = PaymentFlowApi::new(store, provider, EventProducers::default()).with_fees(FeeSchedule::new(230, 100));
    cfg.service(PayForOrderRoute::<MockDukaStore, MockProvider>::new())
        .service(PaymentStatusRoute::<MockDukaStore, MockProvider>::new())
        .service(WalletRoute::<MockDukaStore, MockProvider>::new())
        .service(WithdrawRoute::<MockDukaStore, MockProvider>::new())
        .service(
            web::scope("/webhooks")
                .wrap(WebhookSignatureMiddlewareFactory::new(Secret::new(WEBHOOK_SECRET.to_string())))
                .service(PaypackWebhookRoute::<MockDukaStore, MockProvider>::new()),
        )
        .app_data(web::Data::new(api));
}

fn configure_payments(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(order(id, "alice", OrderStatusType::Confirmed))));
    store.expect_insert_payment().returning(|p| Ok(payment(p)));
    store
        .expect_fetch_wallet_balance()
        .returning(|_| Ok(WalletBalance { balance: Money::from(12_000), pending_withdrawals: Money::from(3_000) }));
    let mut provider = MockProvider::new();
    provider.expect_cash_in().returning(|_, _| {
        Ok(ProviderTransaction { reference: "pp-ref-1".into(), status: PaymentStatus::Pending })
    });
    provider.expect_cash_out().returning(|_, _| {
        Ok(ProviderTransaction { reference: "pp-out-1".into(), status: PaymentStatus::Pending })
    });
    register_payment_routes(cfg, store, provider);
}

fn configure_provider_down(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_order().returning(|id| Ok(Some(order(id, "alice", OrderStatusType::Confirmed))));
    store.expect_fetch_payment_by_ref().returning(|reference| {
        let mut p = payment(new_payment(reference));
        p.status = PaymentStatus::Pending;
        Ok(Some(p))
    });
    let mut provider = MockProvider::new();
    provider.expect_cash_in().returning(|_, _| Err(ProviderError::Unavailable("connection refused".into())));
    provider.expect_latest_status().returning(|_| Err(ProviderError::Unavailable("connection refused".into())));
    register_payment_routes(cfg, store, provider);
}

fn configure_webhook(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_payment_by_ref().returning(|_| Ok(None));
    register_payment_routes(cfg, store, MockProvider::new());
}

/// The store has no expectations, so any storage call fails the test.
fn configure_webhook_without_storage(cfg: &mut ServiceConfig) {
    register_payment_routes(cfg, MockDukaStore::new(), MockProvider::new());
}

fn configure_webhook_db_down(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_payment_by_ref().returning(|_| Err(StorageError::DatabaseError("database is locked".into())));
    register_payment_routes(cfg, store, MockProvider::new());
}

fn configure_webhook_settle_fails(cfg: &mut ServiceConfig) {
    let mut store = MockDukaStore::new();
    store.expect_fetch_payment_by_ref().returning(|reference| {
        let mut p = payment(new_payment(reference));
        p.status = PaymentStatus::Pending;
        Ok(Some(p))
    });
    store.expect_settle_payment().returning(|_, _, _| Err(StorageError::DatabaseError("disk I/O error".into())));
    register_payment_routes(cfg, store, MockProvider::new());
}

fn new_payment(reference: &str) -> NewPayment {
    NewPayment {
        user_id: "alice".into(),
        organization_id: 7,
        phone_number: "0788123456".into(),
        amount: Money::from(5_165),
        base_amount: Money::from(5_000),
        provider_fee: Money::from(115),
        platform_fee: Money::from(50),
        kind: PaymentKind::CashIn,
        plan_name: None,
        provider_ref: reference.into(),
        order_id: Some(1),
    }
}

fn payment(p: NewPayment) -> Payment {
    let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 31, 0).unwrap();
    Payment {
        id: 1,
        user_id: p.user_id,
        organization_id: p.organization_id,
        phone_number: p.phone_number,
        amount: p.amount,
        base_amount: p.base_amount,
        provider_fee: p.provider_fee,
        platform_fee: p.platform_fee,
        currency: "RWF".into(),
        kind: p.kind,
        plan_name: p.plan_name,
        provider_ref: p.provider_ref,
        status: PaymentStatus::Pending,
        order_id: p.order_id,
        processed_at: None,
        created_at,
        updated_at: created_at,
    }
}
