//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here is async and only awaits I/O.
//!
//! Authenticated handlers take a [`SessionClaims`] argument. Merchant routes additionally require the session to carry
//! an organization id, and only ever act on that organization.
use actix_web::{get, http::header, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use duka_engine::{
    order_objects::NewOrderRequest,
    payment_objects::WebhookOutcome,
    traits::Pagination,
    DukaDatabase,
    OrderFlowApi,
    OrderFlowError,
    PaymentFlowApi,
    PaymentProvider,
    StockLedgerApi,
    SubscriptionApi,
};
use log::*;
use paypack_tools::WebhookPayload;
use reqwest::Url;

use crate::{
    auth::SessionClaims,
    config::RouteConfig,
    data_objects::{
        webhook_ack,
        NotificationsQuery,
        OrderActionResponse,
        OrderPlacedResponse,
        PageQuery,
        PayRequest,
        PaymentStatusQuery,
        PaymentStatusResponse,
        StatusUpdateRequest,
        StockChangeRequest,
        StockQuery,
        SubscriptionPaymentRequest,
        WithdrawalRequest,
    },
    errors::{AuthError, ServerError},
    integrations::paypack::settlement_notice,
};

pub const CRON_SECRET_HEADER: &str = "X-Cron-Secret";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//------------------------------------------   Confirmation links  ---------------------------------------------
// The GET variants are what the merchant taps in WhatsApp. They never change anything: they check the token and send
// the browser to the web app, which shows the order and POSTs the decision back.

route!(confirm_page => Get "/orders/confirm/{token}" impl DukaDatabase);
pub async fn confirm_page<B: DukaDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    config: web::Data<RouteConfig>,
) -> HttpResponse {
    token_page(&path.into_inner(), "confirm", api.as_ref(), &config.app_url).await
}

route!(reject_page => Get "/orders/reject/{token}" impl DukaDatabase);
pub async fn reject_page<B: DukaDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    config: web::Data<RouteConfig>,
) -> HttpResponse {
    token_page(&path.into_inner(), "reject", api.as_ref(), &config.app_url).await
}

#[get("/orders/confirm")]
pub async fn confirm_page_without_token(config: web::Data<RouteConfig>) -> HttpResponse {
    debug!("💻️ GET confirm page without a token");
    status_page(&config.app_url, "confirm", "error", "missing-token")
}

#[get("/orders/reject")]
pub async fn reject_page_without_token(config: web::Data<RouteConfig>) -> HttpResponse {
    debug!("💻️ GET reject page without a token");
    status_page(&config.app_url, "reject", "error", "missing-token")
}

async fn token_page<B: DukaDatabase>(token: &str, action: &str, api: &OrderFlowApi<B>, app_url: &str) -> HttpResponse {
    debug!("💻️ GET {action} page");
    match api.check_token(Some(token)).await {
        Ok(order) => {
            trace!("💻️ Token for {order} is valid. Redirecting to the {action} page.");
            redirect(app_url, &format!("/orders/{action}"), &[("token", token)])
        },
        Err(OrderFlowError::AlreadyProcessed(status)) => status_page(app_url, action, "status", &status.to_string()),
        Err(e) => {
            let code = e.token_error_code().unwrap_or_else(|| {
                error!("💻️ Could not check a confirmation token. {e}");
                "server-error".to_string()
            });
            status_page(app_url, action, "error", &code)
        },
    }
}

fn status_page(app_url: &str, action: &str, key: &str, value: &str) -> HttpResponse {
    redirect(app_url, "/orders/status", &[("action", action), (key, value)])
}

fn redirect(app_url: &str, path: &str, params: &[(&str, &str)]) -> HttpResponse {
    let base = format!("{app_url}{path}");
    let location = Url::parse_with_params(&base, params).map(String::from).unwrap_or_else(|e| {
        warn!("💻️ DUKA_APP_URL does not form a valid url ({base}). {e}");
        base
    });
    HttpResponse::Found().insert_header((header::LOCATION, location)).finish()
}

route!(confirm_order => Post "/orders/confirm/{token}" impl DukaDatabase);
pub async fn confirm_order<B: DukaDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST confirm order");
    let order = api.confirm_by_token(Some(path.as_str())).await?;
    Ok(HttpResponse::Ok().json(OrderActionResponse::new(&order)))
}

route!(reject_order => Post "/orders/reject/{token}" impl DukaDatabase);
pub async fn reject_order<B: DukaDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST reject order");
    let order = api.reject_by_token(Some(path.as_str())).await?;
    Ok(HttpResponse::Ok().json(OrderActionResponse::new(&order)))
}

//----------------------------------------------   Customer orders  ----------------------------------------------

route!(place_order => Post "/mobile/orders" impl DukaDatabase);
/// Places an order from the customer's cart. The response carries a WhatsApp link that hands the confirmation link to
/// the merchant, when the merchant has a WhatsApp number on file.
pub async fn place_order<B: DukaDatabase>(
    claims: SessionClaims,
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
    config: web::Data<RouteConfig>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST new order for {}", claims.user_id);
    let created = api.create_order(&claims.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(OrderPlacedResponse::new(&created, &config.app_url)))
}

route!(my_orders => Get "/mobile/orders" impl DukaDatabase);
pub async fn my_orders<B: DukaDatabase>(
    claims: SessionClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.user_id);
    let orders = api.fetch_orders_for_user(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(my_order => Get "/mobile/orders/{id}" impl DukaDatabase);
pub async fn my_order<B: DukaDatabase>(
    claims: SessionClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for {}", claims.user_id);
    let order = api.fetch_order_for_user(&claims.user_id, order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/mobile/orders/{id}/cancel" impl DukaDatabase);
pub async fn cancel_order<B: DukaDatabase>(
    claims: SessionClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST cancel order {order_id} for {}", claims.user_id);
    let order = api.cancel_by_customer(&claims.user_id, order_id).await?;
    Ok(HttpResponse::Ok().json(OrderActionResponse::with_status(&order)))
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(pay_for_order => Post "/mobile/orders/{id}/pay" impl DukaDatabase, PaymentProvider);
/// Starts a mobile-money charge for the order. The customer approves it on their handset, then the app polls
/// `payment-status` for up to `pollTimeoutSecs`.
pub async fn pay_for_order<B: DukaDatabase, P: PaymentProvider>(
    claims: SessionClaims,
    path: web::Path<i64>,
    body: web::Json<PayRequest>,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST pay for order {order_id} by {}", claims.user_id);
    let payment = api.initiate_order_payment(&claims.user_id, order_id, &body.phone_number).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(payment_status => Get "/mobile/orders/{id}/payment-status" impl DukaDatabase, PaymentProvider);
pub async fn payment_status<B: DukaDatabase, P: PaymentProvider>(
    claims: SessionClaims,
    path: web::Path<i64>,
    query: web::Query<PaymentStatusQuery>,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET payment status for [{}] on order {order_id}", query.provider_ref);
    let status = api.poll_payment_status(&claims.user_id, order_id, &query.provider_ref).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusResponse { status }))
}

route!(paypack_webhook => Post "/paypack" impl DukaDatabase, PaymentProvider);
/// Paypack calls this for every transaction event. The signature has already been checked by the webhook middleware.
///
/// Unknown references, replays and signed payloads we cannot read are acknowledged with a 200 so that Paypack stops
/// retrying. A retry carries the same bytes, so it cannot help with the last case. Only a failure on our side returns
/// a 500, which invites a retry.
pub async fn paypack_webhook<B: DukaDatabase, P: PaymentProvider>(
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let payload = match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("💻️ Could not read Paypack webhook payload. It will be acknowledged and dropped. {e}");
            return Ok(HttpResponse::Ok().json(webhook_ack(WebhookOutcome::Ignored)));
        },
    };
    info!("💻️ Paypack webhook: [{}] {} {}", payload.data.reference, payload.data.kind, payload.data.status);
    let outcome = api.settle_from_webhook(settlement_notice(&payload)).await.map_err(|e| {
        error!("💻️ Could not settle payment [{}]. {e}", payload.data.reference);
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(webhook_ack(outcome)))
}

//----------------------------------------------   Merchant  ----------------------------------------------------

route!(update_order_status => Patch "/merchant/orders/{id}/status" impl DukaDatabase);
pub async fn update_order_status<B: DukaDatabase>(
    claims: SessionClaims,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let organization_id = claims.merchant()?;
    let order_id = path.into_inner();
    debug!("💻️ PATCH order {order_id} to {} for merchant #{organization_id}", body.status);
    let order = api.update_status_for_merchant(organization_id, order_id, body.status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(change_stock => Post "/merchant/products/{id}/stock" impl DukaDatabase);
pub async fn change_stock<B: DukaDatabase>(
    claims: SessionClaims,
    path: web::Path<i64>,
    body: web::Json<StockChangeRequest>,
    api: web::Data<StockLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let organization_id = claims.merchant()?;
    let product_id = path.into_inner();
    let StockChangeRequest { quantity, change_type, reason } = body.into_inner();
    debug!("💻️ POST {change_type} of {quantity} for product {product_id}");
    let entry = api.apply_manual_change(organization_id, product_id, quantity, change_type, reason).await?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(stock_history => Get "/merchant/products/{id}/stock/history" impl DukaDatabase);
pub async fn stock_history<B: DukaDatabase>(
    claims: SessionClaims,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
    api: web::Data<StockLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let organization_id = claims.merchant()?;
    let product_id = path.into_inner();
    let pagination = Pagination::new(query.page, query.limit);
    trace!("💻️ GET stock history for product {product_id}, page {}", pagination.page);
    let history = api.stock_history(organization_id, product_id, pagination).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(stock_levels => Get "/merchant/stock" impl DukaDatabase);
pub async fn stock_levels<B: DukaDatabase>(
    claims: SessionClaims,
    query: web::Query<StockQuery>,
    api: web::Data<StockLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    claims.merchant()?;
    let ids = query.product_ids().map_err(ServerError::InvalidRequest)?;
    trace!("💻️ GET stock levels for {} products", ids.len());
    let levels = api.stock_levels(&ids).await?;
    Ok(HttpResponse::Ok().json(levels))
}

route!(pay_for_subscription => Post "/merchant/subscription/pay" impl DukaDatabase, PaymentProvider);
pub async fn pay_for_subscription<B: DukaDatabase, P: PaymentProvider>(
    claims: SessionClaims,
    body: web::Json<SubscriptionPaymentRequest>,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let organization_id = claims.merchant()?;
    debug!("💻️ POST subscription payment for the {} plan by merchant #{organization_id}", body.plan_name);
    let payment =
        api.initiate_subscription_payment(&claims.user_id, organization_id, &body.plan_name, &body.phone_number).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(wallet => Get "/merchant/wallet" impl DukaDatabase, PaymentProvider);
pub async fn wallet<B: DukaDatabase, P: PaymentProvider>(
    claims: SessionClaims,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let organization_id = claims.merchant()?;
    trace!("💻️ GET wallet for merchant #{organization_id}");
    let balance = api.wallet_balance(organization_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(withdraw => Post "/merchant/wallet/withdraw" impl DukaDatabase, PaymentProvider);
pub async fn withdraw<B: DukaDatabase, P: PaymentProvider>(
    claims: SessionClaims,
    body: web::Json<WithdrawalRequest>,
    api: web::Data<PaymentFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError> {
    let organization_id = claims.merchant()?;
    debug!("💻️ POST withdrawal of {} for merchant #{organization_id}", body.amount);
    let payment = api.request_withdrawal(&claims.user_id, organization_id, body.amount, &body.phone_number).await?;
    Ok(HttpResponse::Ok().json(payment))
}

//----------------------------------------------   Notifications  -----------------------------------------------

route!(my_notifications => Get "/notifications" impl DukaDatabase);
pub async fn my_notifications<B: DukaDatabase>(
    claims: SessionClaims,
    query: web::Query<NotificationsQuery>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET notifications for {}", claims.user_id);
    let notifications = api.notifications_for_user(&claims.user_id, query.limit()).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

//----------------------------------------------   Scheduled jobs  ----------------------------------------------

route!(run_subscription_job => Post "/cron/subscriptions" impl DukaDatabase);
/// Runs the subscription expiry and reminder sweep on demand, for hosts that prefer an external scheduler to the
/// in-process worker. Callers must present `DUKA_CRON_SECRET` in the `X-Cron-Secret` header.
pub async fn run_subscription_job<B: DukaDatabase>(
    req: HttpRequest,
    api: web::Data<SubscriptionApi<B>>,
    config: web::Data<RouteConfig>,
) -> Result<HttpResponse, ServerError> {
    let presented = req.headers().get(CRON_SECRET_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if config.cron_secret.is_empty() || presented != config.cron_secret.reveal().as_str() {
        warn!("🔐️ Rejected a call to the subscription job with a missing or invalid cron secret");
        return Err(AuthError::InvalidCronSecret.into());
    }
    info!("💻️ Running the subscription job on request");
    let sweep = api.run_maintenance(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(sweep))
}
