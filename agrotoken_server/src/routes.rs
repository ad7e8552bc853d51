//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use std::str::FromStr;

use actix_web::{get, http::header::CONTENT_TYPE, web, HttpRequest, HttpResponse, Responder};
use agrotoken_engine::{
    db_types::{OrderId, OrderStatusType},
    MediaApi,
    MediaStore,
    PriceApi,
    PriceStore,
    SettlementApi,
    SettlementLedgerDatabase,
};
use chain_tools::ChainApi;
use log::*;
use pinning_tools::PinningApi;
use serde::Deserialize;

use crate::{data_objects::NewOrderRequest, errors::ServerError, integrations::pinning::upload_crop_media};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

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

//----------------------------------------------   Orders  ----------------------------------------------------

route!(order_by_id => Get "/orders/{order_id}" impl SettlementLedgerDatabase);
/// Returns the current state of a single order, including its version, payment reference and mint transaction.
pub async fn order_by_id<B: SettlementLedgerDatabase>(
    path: web::Path<String>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("📦️ GET order {order_id}");
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(order))
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    status: String,
    #[serde(default)]
    limit: Option<i64>,
}

route!(orders => Get "/orders" impl SettlementLedgerDatabase);
/// Lists orders in a given state, e.g. `/orders?status=Paid&limit=50`.
pub async fn orders<B: SettlementLedgerDatabase>(
    query: web::Query<OrderQuery>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let status = OrderStatusType::from_str(&query.status)
        .map_err(|_| ServerError::InvalidRequestPath(format!("'{}' is not a valid order status", query.status)))?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    debug!("📦️ GET orders in state {status} (limit {limit})");
    let orders = api.fetch_orders_in_state(status, limit).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(create_order => Post "/orders" impl SettlementLedgerDatabase);
/// Registers a new order and submits it for payment. Posting an existing order id returns the stored order
/// unchanged with a 200 rather than a 201.
pub async fn create_order<B: SettlementLedgerDatabase>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("📦️ POST new order {}", request.order_id);
    let (order, inserted) = api.create_order(request.into()).await?;
    if !inserted {
        info!("📦️ Order {} already exists. Returning the stored record.", order.order_id);
        return Ok(HttpResponse::Ok().json(order));
    }
    let order = api.submit_order(&order.order_id).await?;
    info!("📦️ Order {} created and awaiting payment", order.order_id);
    Ok(HttpResponse::Created().json(order))
}

//----------------------------------------------   Prices  ----------------------------------------------------

route!(prices => Get "/prices" impl PriceStore);
/// Returns the latest stored quote for every polled commodity symbol.
pub async fn prices<B: PriceStore>(api: web::Data<PriceApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💹️ GET prices");
    let quotes = api.fetch_all_quotes().await?;
    Ok(HttpResponse::Ok().json(quotes))
}

//----------------------------------------------   Contracts  ----------------------------------------------------

#[get("/contracts")]
pub async fn contracts(api: web::Data<ChainApi>) -> Result<HttpResponse, ServerError> {
    trace!("⛓️ GET contract info");
    let info = api.contract_info().await.map_err(|e| ServerError::ChainError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(info))
}

//----------------------------------------------   Media  ----------------------------------------------------

route!(upload_media => Post "/media/{crop_id}" impl MediaStore);
/// Pins a blob of crop media. The body is the raw bytes; the content type header is stored alongside the
/// content-derived id.
pub async fn upload_media<B: MediaStore>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    pinning: web::Data<PinningApi>,
    media: web::Data<MediaApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let crop_id = path.into_inner();
    if body.is_empty() {
        return Err(ServerError::InvalidRequestBody("Media uploads may not be empty".to_string()));
    }
    let mime_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    debug!("🖼️ POST {} bytes of media for crop {crop_id}", body.len());
    let result = upload_crop_media(pinning.get_ref(), media.get_ref(), &crop_id, &mime_type, body.to_vec()).await?;
    let mut response = if result.newly_pinned { HttpResponse::Created() } else { HttpResponse::Ok() };
    Ok(response.json(result))
}
