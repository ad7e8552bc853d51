use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{LedgerEvent, NewOrder, NewWebhookEvent, Order, OrderId, OrderStatusType, WebhookOutcome},
    events::{EventProducers, OrderStateChangedEvent},
    traits::{InsertEventResult, SettlementLedgerDatabase, SettlementLedgerError, TransitionOutcome},
};

/// How often a transition is retried with a fresh read after losing a version race before the caller gives up.
/// Races on a single order are short-lived (two webhook deliveries, or a webhook racing the mint worker), so a
/// small bound suffices; a persistent conflict is surfaced as an error instead of looping forever.
const MAX_TRANSITION_ATTEMPTS: u32 = 5;

/// An inbound, signature-verified gateway event, ready for ingestion. Construction happens at the server boundary
/// after (and only after) HMAC verification of the raw body.
#[derive(Debug, Clone)]
pub struct WebhookNotification {
    /// The gateway-assigned event id. Carries the deduplication guarantee.
    pub event_id: String,
    /// The gateway's event type string, e.g. `payment.captured`.
    pub event_type: String,
    pub order_id: OrderId,
    pub payment_ref: Option<String>,
    /// Digest of the raw payload bytes, for the audit log.
    pub payload_digest: String,
}

/// The observable result of ingesting a webhook delivery.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The event was processed to completion (possibly as an idempotent no-op).
    Accepted(Order),
    /// A delivery of an event id that has already been processed. Not an error.
    Duplicate,
    /// The event could not be applied (unknown type, unknown order, or invalid transition). The gateway is still
    /// answered with success to stop redelivery storms; the anomaly lives in the audit log.
    Rejected(String),
}

/// `SettlementApi` is the primary API for order lifecycle flows: webhook ingestion, mint orchestration support and
/// order queries. All state changes go through the ledger's version-guarded transitions, and every applied
/// transition is published to subscribers after the database write, outside any transaction boundary.
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> SettlementApi<B>
where B: SettlementLedgerDatabase
{
    /// Stores a brand-new order in `Created` state. Idempotent: re-submitting an existing order id returns the
    /// stored record with `false` in the second element.
    pub async fn create_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementLedgerError> {
        self.db.create_order(order).await
    }

    /// Moves a `Created` order to `AwaitingPayment`. Called when the storefront submits the order for payment.
    pub async fn submit_order(&self, order_id: &OrderId) -> Result<Order, SettlementLedgerError> {
        self.apply_with_retry(order_id, LedgerEvent::Submit).await
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementLedgerError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn fetch_orders_in_state(
        &self,
        status: OrderStatusType,
        limit: i64,
    ) -> Result<Vec<Order>, SettlementLedgerError> {
        self.db.fetch_orders_in_state(status, limit).await
    }

    /// Ingests a signature-verified gateway event.
    ///
    /// The flow is: record the event id (idempotent) → map the event type onto the closed set of ledger events →
    /// apply the transition under the version guard, re-reading on conflict → finalise the audit outcome. A
    /// delivery of an already-completed event id short-circuits to [`IngestOutcome::Duplicate`] without touching
    /// the order. Only infrastructure failures (and a version race that persists past the retry bound, which the
    /// gateway should redeliver later) surface as `Err`.
    pub async fn ingest_webhook(&self, notification: WebhookNotification) -> Result<IngestOutcome, SettlementLedgerError> {
        let event_id = notification.event_id.clone();
        let audit = NewWebhookEvent::new(event_id.clone(), notification.payload_digest.clone());
        if let InsertEventResult::AlreadyExists(prior) = self.db.insert_webhook_event(audit).await? {
            match prior.outcome {
                WebhookOutcome::Accepted => {
                    debug!("📨️ Event [{event_id}] already processed. Acknowledging without reprocessing.");
                    return Ok(IngestOutcome::Duplicate);
                },
                WebhookOutcome::Rejected => {
                    debug!("📨️ Event [{event_id}] was previously rejected. Acknowledging without reprocessing.");
                    return Ok(IngestOutcome::Rejected("event was previously rejected".into()));
                },
                // A Pending record means an earlier delivery died mid-flight. Process this one to completion.
                WebhookOutcome::Pending => {
                    info!("📨️ Event [{event_id}] was recorded but never completed. Reprocessing.");
                },
            }
        }
        let event = match self.map_event_type(&notification) {
            Ok(ev) => ev,
            Err(reason) => {
                warn!("📨️ Rejecting event [{event_id}]: {reason}");
                self.db.set_webhook_outcome(&event_id, WebhookOutcome::Rejected).await?;
                return Ok(IngestOutcome::Rejected(reason));
            },
        };
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let order = match self.db.fetch_order(&notification.order_id).await? {
                Some(order) => order,
                None => {
                    warn!("📨️ Event [{event_id}] references unknown order {}", notification.order_id);
                    self.db.set_webhook_outcome(&event_id, WebhookOutcome::Rejected).await?;
                    return Ok(IngestOutcome::Rejected(format!("unknown order {}", notification.order_id)));
                },
            };
            match self.db.transition(&notification.order_id, event.clone(), order.version).await {
                Ok(TransitionOutcome::Applied(order)) => {
                    self.db.set_webhook_outcome(&event_id, WebhookOutcome::Accepted).await?;
                    info!("📨️ Event [{event_id}] accepted. Order {} is now {}", order.order_id, order.status);
                    self.call_order_state_hook(&order).await;
                    return Ok(IngestOutcome::Accepted(order));
                },
                Ok(TransitionOutcome::NoOp(order)) => {
                    // e.g. a second, distinct capture event for an order that is already paid.
                    self.db.set_webhook_outcome(&event_id, WebhookOutcome::Accepted).await?;
                    info!("📨️ Event [{event_id}] is a no-op for order {} at {}", order.order_id, order.status);
                    return Ok(IngestOutcome::Accepted(order));
                },
                Err(SettlementLedgerError::VersionConflict(oid)) => {
                    trace!("📨️ Version race on order {oid} while applying [{event_id}]. Re-reading.");
                    continue;
                },
                Err(SettlementLedgerError::InvalidTransition(e)) => {
                    warn!("📨️ Event [{event_id}] rejected by the state machine: {e}");
                    self.db.set_webhook_outcome(&event_id, WebhookOutcome::Rejected).await?;
                    return Ok(IngestOutcome::Rejected(e.to_string()));
                },
                Err(e) => return Err(e),
            }
        }
        // The event stays Pending; the gateway will redeliver and we will pick it up again.
        warn!("📨️ Gave up applying [{event_id}] after {MAX_TRANSITION_ATTEMPTS} version races.");
        Err(SettlementLedgerError::VersionConflict(notification.order_id))
    }

    /// Claims a `Paid` order for minting via the version-guarded `Paid → Minting` transition. Returns `None` if a
    /// concurrent worker won the claim, or if the order has moved on since the caller read it. Both mean "not
    /// yours to mint", not an error.
    pub async fn claim_for_minting(&self, order: &Order) -> Result<Option<Order>, SettlementLedgerError> {
        match self.db.transition(&order.order_id, LedgerEvent::ClaimForMinting, order.version).await {
            Ok(TransitionOutcome::Applied(order)) => {
                debug!("⛓️ Claimed order {} for minting (version {})", order.order_id, order.version);
                self.call_order_state_hook(&order).await;
                Ok(Some(order))
            },
            Ok(TransitionOutcome::NoOp(_)) => Ok(None),
            Err(SettlementLedgerError::VersionConflict(oid)) => {
                debug!("⛓️ Lost the claim race for order {oid}");
                Ok(None)
            },
            Err(SettlementLedgerError::InvalidTransition(e)) => {
                debug!("⛓️ Order {} is no longer claimable: {e}", order.order_id);
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Records a confirmed on-chain mint: `Minting → Minted`, with the transaction reference persisted atomically
    /// alongside the status.
    pub async fn complete_mint(&self, order_id: &OrderId, txid: String) -> Result<Order, SettlementLedgerError> {
        self.apply_with_retry(order_id, LedgerEvent::MintConfirmed { txid }).await
    }

    /// Records that the mint retry budget was exhausted: `Minting → Failed`.
    pub async fn fail_mint(&self, order_id: &OrderId) -> Result<Order, SettlementLedgerError> {
        self.apply_with_retry(order_id, LedgerEvent::MintFailed).await
    }

    /// Operator action: puts a `Failed` order back in the mint queue (`Failed → Paid`).
    pub async fn requeue_failed_mint(&self, order_id: &OrderId) -> Result<Order, SettlementLedgerError> {
        self.apply_with_retry(order_id, LedgerEvent::Requeue).await
    }

    fn map_event_type(&self, n: &WebhookNotification) -> Result<LedgerEvent, String> {
        match n.event_type.as_str() {
            "payment.captured" => match &n.payment_ref {
                Some(payment_ref) => Ok(LedgerEvent::PaymentCaptured { payment_ref: payment_ref.clone() }),
                None => Err("payment.captured event without a payment reference".to_string()),
            },
            "payment.failed" => Ok(LedgerEvent::PaymentFailed),
            // Unknown event types are explicitly rejected, never silently ignored.
            other => Err(format!("unknown event type '{other}'")),
        }
    }

    /// Applies an internally-triggered event, re-reading on version races up to the retry bound.
    async fn apply_with_retry(&self, order_id: &OrderId, event: LedgerEvent) -> Result<Order, SettlementLedgerError> {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let order = self
                .db
                .fetch_order(order_id)
                .await?
                .ok_or_else(|| SettlementLedgerError::OrderNotFound(order_id.clone()))?;
            match self.db.transition(order_id, event.clone(), order.version).await {
                Ok(outcome) => {
                    if let TransitionOutcome::Applied(order) = &outcome {
                        self.call_order_state_hook(order).await;
                    }
                    return Ok(outcome.order().clone());
                },
                Err(SettlementLedgerError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SettlementLedgerError::VersionConflict(order_id.clone()))
    }

    async fn call_order_state_hook(&self, order: &Order) {
        for emitter in &self.producers.order_state_producers {
            trace!("🔄️ Notifying order state subscribers for {}", order.order_id);
            let event = OrderStateChangedEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
