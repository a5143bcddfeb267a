use actix_web::{
    http::StatusCode,
    test::TestRequest,
    web::{self, ServiceConfig},
};
use duka_engine::{db_types::Subscription, traits::ReminderWindow, SubscriptionApi};
use serde_json::Value;

use super::{
    helpers::{add_common_data, send, CRON_SECRET},
    mocks::MockDukaStore,
};
use crate::routes::{RunSubscriptionJobRoute, CRON_SECRET_HEADER};

#[actix_web::test]
async fn cron_without_secret() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::post().uri("/cron/subscriptions"), configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.starts_with(r#"{"error":"#));
}

#[actix_web::test]
async fn cron_with_wrong_secret() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/cron/subscriptions").insert_header((CRON_SECRET_HEADER, "guess"));
    let (status, _) = send(req, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn cron_runs_the_sweep() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/cron/subscriptions").insert_header((CRON_SECRET_HEADER, CRON_SECRET));
    let (status, body) = send(req, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert!(json.is_object());
}

fn configure(cfg: &mut ServiceConfig) {
    add_common_data(cfg);
    let mut store = MockDukaStore::new();
    store.expect_expire_subscriptions().returning(|_| Ok(Vec::<Subscription>::new()));
    store.expect_claim_reminders().returning(|_: ReminderWindow, _| Ok(vec![]));
    let api = SubscriptionApi::new(store);
    cfg.service(RunSubscriptionJobRoute::<MockDukaStore>::new()).app_data(web::Data::new(api));
}
