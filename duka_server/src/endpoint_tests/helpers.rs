use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{DateTime, Duration, TimeZone, Utc};
use duka_common::{Money, Secret};
use duka_engine::db_types::{Order, OrderStatusType};
use log::debug;

use crate::{
    auth::{SessionClaims, SessionVerifier},
    config::RouteConfig,
};

pub const APP_URL: &str = "https://app.duka.test";
pub const CRON_SECRET: &str = "cron-secret-for-tests";
// Test-only secret. DO NOT re-use it anywhere.
const SESSION_SECRET: &str = "4b1d2b3e9a8c7f6e5d4c3b2a19081726";

pub fn session_verifier() -> SessionVerifier {
    SessionVerifier::new(Secret::new(SESSION_SECRET.to_string()))
}

pub fn route_config() -> RouteConfig {
    RouteConfig { app_url: APP_URL.to_string(), cron_secret: Secret::new(CRON_SECRET.to_string()) }
}

/// Registers what every authenticated route needs, besides the engine API under test.
pub fn add_common_data(cfg: &mut ServiceConfig) {
    cfg.app_data(web::Data::new(session_verifier())).app_data(web::Data::new(route_config()));
}

pub fn customer_token(user_id: &str) -> String {
    issue_token(user_id, None, Utc::now() + Duration::days(1))
}

pub fn merchant_token(user_id: &str, organization_id: i64) -> String {
    issue_token(user_id, Some(organization_id), Utc::now() + Duration::days(1))
}

pub fn issue_token(user_id: &str, organization_id: Option<i64>, expires_at: DateTime<Utc>) -> String {
    let claims = SessionClaims { user_id: user_id.to_string(), organization_id, expires_at };
    session_verifier().issue(&claims).expect("Failed to sign token")
}

pub fn with_auth(req: TestRequest, token: &str) -> TestRequest {
    if token.is_empty() {
        req
    } else {
        req.insert_header(("Authorization", format!("Bearer {token}")))
    }
}

/// Sends the request to an app built from `configure`. Middleware failures come back as `Err`; handler errors are
/// regular responses with an error status.
pub async fn send(req: TestRequest, configure: fn(&mut ServiceConfig)) -> Result<(StatusCode, String), String> {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

/// Like [`send`], but returns the `Location` header of a redirect instead of the body.
pub async fn redirect_location(
    req: TestRequest,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let res = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?;
    let location = res
        .headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or_else(|| format!("No Location header in a {} response", res.status()))?;
    Ok((res.status(), location))
}

pub fn order(id: i64, user_id: &str, status: OrderStatusType) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
    Order {
        id,
        order_number: id + 100,
        user_id: user_id.to_string(),
        organization_id: 7,
        status,
        total_price: Money::from(5_000),
        paid: false,
        paid_at: None,
        confirmation_token: Some("tok3n".to_string()),
        token_expires_at: Some(Utc::now() + Duration::hours(12)),
        notes: None,
        created_at,
        updated_at: created_at,
        confirmed_at: None,
    }
}
