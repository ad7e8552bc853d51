//----------------------------------------------   Payment webhooks  ----------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use agrotoken_engine::{
    db_types::OrderId,
    IngestOutcome,
    SettlementApi,
    SettlementLedgerDatabase,
    SettlementLedgerError,
    WebhookNotification,
};
use log::*;
use sha2::{Digest, Sha256};

use crate::{
    data_objects::{JsonResponse, PaymentEventPayload},
    errors::ServerError,
    route,
};

route!(payment_webhook => Post "/payment" impl SettlementLedgerDatabase);
/// Receives payment events from the gateway. The HMAC middleware has already verified the signature against
/// the raw body by the time this handler parses it.
///
/// Webhook responses must always be in the 200 range for anything the gateway should not redeliver: duplicates
/// and rejected transitions are acknowledged, not errored. Only a persistent version race escapes as a 500 so
/// that the gateway redelivers the event.
pub async fn payment_webhook<B: SettlementLedgerDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("📨️ Received webhook request: {}", req.uri());
    let payload_digest = hex::encode(Sha256::digest(&body));
    let payload = match serde_json::from_slice::<PaymentEventPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            // A malformed body will never parse on redelivery either, so acknowledge and drop it.
            warn!("📨️ Could not parse webhook body. {e}");
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("Could not parse webhook body.")));
        },
    };
    let notification = WebhookNotification {
        event_id: payload.event_id,
        event_type: payload.event_type,
        order_id: OrderId(payload.order_id),
        payment_ref: payload.payment_ref,
        payload_digest,
    };
    let event_id = notification.event_id.clone();
    let result = match api.ingest_webhook(notification).await {
        Ok(IngestOutcome::Accepted(order)) => {
            info!("📨️ Event {event_id} accepted. Order {} is now {}.", order.order_id, order.status);
            JsonResponse::success("Event accepted.")
        },
        Ok(IngestOutcome::Duplicate) => {
            info!("📨️ Event {event_id} was already processed.");
            JsonResponse::success("Event already processed.")
        },
        Ok(IngestOutcome::Rejected(reason)) => {
            warn!("📨️ Event {event_id} rejected: {reason}");
            JsonResponse::failure(reason)
        },
        Err(e @ SettlementLedgerError::VersionConflict(_)) => {
            // Let the gateway redeliver; the next delivery will dedup or apply cleanly.
            warn!("📨️ Event {event_id} lost every version race: {e}");
            return Err(ServerError::BackendError(e.to_string()));
        },
        Err(e) => {
            error!("📨️ Unexpected error while ingesting event {event_id}. {e}");
            return Err(ServerError::BackendError(e.to_string()));
        },
    };
    Ok(HttpResponse::Ok().json(result))
}
