use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use agrotoken_engine::{
    events::EventProducers,
    MediaApi,
    PriceApi,
    SettlementApi,
    SqliteDatabase,
};
use chain_tools::{ChainApi, ChainConfig};
use log::*;
use pinning_tools::{PinningApi, PinningConfig};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::price_feed::CommodityFeedClient,
    middleware::HmacMiddlewareFactory,
    mint_worker::start_mint_worker,
    price_worker::start_price_worker,
    routes::{contracts, health, CreateOrderRoute, OrderByIdRoute, OrdersRoute, PricesRoute, UploadMediaRoute},
    webhook_routes::PaymentWebhookRoute,
    ws::{create_broadcast_event_handlers, ws_handler, SubscriptionRegistry},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    agrotoken_engine::run_migrations(db.pool()).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let registry = SubscriptionRegistry::new();
    let handlers = create_broadcast_event_handlers(registry.clone());
    let producers = handlers.producers();
    handlers.start_handlers();

    start_workers(&config, db.clone(), producers.clone())?;
    let srv = create_server_instance(config, db, producers, registry)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

fn start_workers(config: &ServerConfig, db: SqliteDatabase, producers: EventProducers) -> Result<(), ServerError> {
    let chain = ChainApi::new(config.chain.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    start_mint_worker(db.clone(), producers.clone(), chain, config.minting.clone());
    if config.prices.feed_url.is_empty() {
        warn!("💹️ No price feed configured. The price poller will not run.");
    } else {
        let feed = CommodityFeedClient::new(&config.prices.feed_url)
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        start_price_worker(db, producers, config.prices.clone(), feed);
    }
    Ok(())
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    registry: SubscriptionRegistry,
) -> Result<Server, ServerError> {
    let chain_config = config.chain.clone();
    let pinning_config = config.pinning.clone();
    let srv = HttpServer::new(move || {
        let settlement_api = SettlementApi::new(db.clone(), producers.clone());
        let price_api = PriceApi::new(db.clone(), producers.clone());
        let media_api = MediaApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("agt::access_log"))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(price_api))
            .app_data(web::Data::new(media_api))
            .app_data(web::Data::new(registry.clone()));
        let app = match ChainApi::new(chain_config.clone()) {
            Ok(api) => app.app_data(web::Data::new(api)),
            Err(e) => {
                error!("⛓️ Could not initialize the chain client: {e}");
                app
            },
        };
        let app = match PinningApi::new(pinning_config.clone()) {
            Ok(api) => app.app_data(web::Data::new(api)),
            Err(e) => {
                error!("🖼️ Could not initialize the pinning client: {e}");
                app
            },
        };
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                &config.webhook.hmac_header,
                config.webhook.hmac_secret.clone(),
                config.webhook.hmac_checks,
            ))
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(contracts)
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(OrdersRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(PricesRoute::<SqliteDatabase>::new())
            .service(UploadMediaRoute::<SqliteDatabase>::new())
            .service(webhook_scope)
            .route("/ws", web::get().to(ws_handler))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
