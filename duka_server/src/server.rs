use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use duka_engine::{
    events::EventProducers,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
    StockLedgerApi,
    SubscriptionApi,
};
use log::*;
use paypack_tools::PaypackApi;

use crate::{
    auth::SessionVerifier,
    config::ServerConfig,
    errors::ServerError,
    integrations::{
        paypack::PaypackProvider,
        realtime::{create_realtime_event_handlers, RealtimePublisher},
    },
    middleware::WebhookSignatureMiddlewareFactory,
    routes::{
        confirm_page_without_token,
        health,
        reject_page_without_token,
        CancelOrderRoute,
        ChangeStockRoute,
        ConfirmOrderRoute,
        ConfirmPageRoute,
        MyNotificationsRoute,
        MyOrderRoute,
        MyOrdersRoute,
        PayForOrderRoute,
        PayForSubscriptionRoute,
        PaymentStatusRoute,
        PaypackWebhookRoute,
        PlaceOrderRoute,
        RejectOrderRoute,
        RejectPageRoute,
        RunSubscriptionJobRoute,
        StockHistoryRoute,
        StockLevelsRoute,
        UpdateOrderStatusRoute,
        WalletRoute,
        WithdrawRoute,
    },
    subscription_worker::start_subscription_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    info!("🗃️ Database is ready at {}", db.url());
    let publisher = RealtimePublisher::new(config.realtime_url.clone())?;
    let handlers = create_realtime_event_handlers(publisher);
    let producers = handlers.producers();
    let _handles = handlers.start_handlers();
    let paypack = PaypackApi::new(config.paypack.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the Paypack client. {e}")))?;
    let provider = PaypackProvider::new(paypack);
    if config.subscription_check_interval > chrono::Duration::zero() {
        let _worker = start_subscription_worker(db.clone(), config.subscription_check_interval);
    }
    let srv = create_server_instance(config, db, provider, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provider: PaypackProvider,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let bind_to = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone()).with_token_ttl(config.token_ttl);
        let payments_api =
            PaymentFlowApi::new(db.clone(), provider.clone(), producers.clone()).with_fees(config.fees);
        let stock_api = StockLedgerApi::new(db.clone());
        let subscription_api = SubscriptionApi::new(db.clone());
        let sessions = SessionVerifier::new(config.session_secret.clone());
        let webhook_scope = web::scope("/webhooks")
            .wrap(WebhookSignatureMiddlewareFactory::new(config.webhook_secret.clone()))
            .service(PaypackWebhookRoute::<SqliteDatabase, PaypackProvider>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("duka::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(stock_api))
            .app_data(web::Data::new(subscription_api))
            .app_data(web::Data::new(sessions))
            .app_data(web::Data::new(config.route_config()))
            .service(health)
            .service(confirm_page_without_token)
            .service(reject_page_without_token)
            .service(ConfirmPageRoute::<SqliteDatabase>::new())
            .service(RejectPageRoute::<SqliteDatabase>::new())
            .service(ConfirmOrderRoute::<SqliteDatabase>::new())
            .service(RejectOrderRoute::<SqliteDatabase>::new())
            .service(PlaceOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(MyOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(PayForOrderRoute::<SqliteDatabase, PaypackProvider>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, PaypackProvider>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(ChangeStockRoute::<SqliteDatabase>::new())
            .service(StockHistoryRoute::<SqliteDatabase>::new())
            .service(StockLevelsRoute::<SqliteDatabase>::new())
            .service(PayForSubscriptionRoute::<SqliteDatabase, PaypackProvider>::new())
            .service(WalletRoute::<SqliteDatabase, PaypackProvider>::new())
            .service(WithdrawRoute::<SqliteDatabase, PaypackProvider>::new())
            .service(MyNotificationsRoute::<SqliteDatabase>::new())
            .service(RunSubscriptionJobRoute::<SqliteDatabase>::new())
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(bind_to)?
    .run();
    Ok(srv)
}
