use thiserror::Error;

use crate::{
    db_types::{LedgerEvent, NewOrder, NewWebhookEvent, Order, OrderId, OrderStatusType, WebhookEvent, WebhookOutcome},
    state_machine::TransitionError,
};

/// The durable record of purchase orders and their state-machine progress.
///
/// The sole concurrency-correctness requirement a backend must provide: only one transition of any kind may succeed
/// per order version. [`Self::transition`] is specified as a compare-and-swap on the version counter; everything
/// else in the engine builds on that guarantee.
#[allow(async_fn_in_trait)]
pub trait SettlementLedgerDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores the order, returning `false` in the second element if an order with this id already existed.
    async fn create_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementLedgerError>;

    /// Fetches the current, authoritative record for the order.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementLedgerError>;

    /// Fetches up to `limit` orders in the given state, oldest first.
    async fn fetch_orders_in_state(
        &self,
        status: OrderStatusType,
        limit: i64,
    ) -> Result<Vec<Order>, SettlementLedgerError>;

    /// Applies `event` to the order, conditioned on the version being unchanged since the caller read it.
    ///
    /// The status and the payment/mint reference fields change together, atomically, and the version is bumped by
    /// exactly one. If a concurrent writer won the race, [`SettlementLedgerError::VersionConflict`] is returned and
    /// nothing is written; the caller must re-read and retry, or abandon. An event the state machine acknowledges
    /// without a state change (e.g. a repeated capture) returns [`TransitionOutcome::NoOp`] and does not bump the
    /// version.
    async fn transition(
        &self,
        order_id: &OrderId,
        event: LedgerEvent,
        expected_version: i64,
    ) -> Result<TransitionOutcome, SettlementLedgerError>;

    /// Records an inbound webhook event with `Pending` outcome. If an event with this id already exists, the
    /// existing record is returned untouched.
    async fn insert_webhook_event(&self, event: NewWebhookEvent) -> Result<InsertEventResult, SettlementLedgerError>;

    /// Finalises the audit outcome for a webhook event.
    async fn set_webhook_outcome(
        &self,
        event_id: &str,
        outcome: WebhookOutcome,
    ) -> Result<(), SettlementLedgerError>;

    /// Fetches the audit record for a webhook event id.
    async fn fetch_webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>, SettlementLedgerError>;
}

/// The result of applying a ledger event.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The transition was applied; the returned order carries the new status and version.
    Applied(Order),
    /// The state machine acknowledged the event without changing anything.
    NoOp(Order),
}

impl TransitionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            TransitionOutcome::Applied(o) | TransitionOutcome::NoOp(o) => o,
        }
    }
}

/// The result of recording a webhook event.
#[derive(Debug, Clone)]
pub enum InsertEventResult {
    Inserted(WebhookEvent),
    /// An event with this id was already on record; deduplication happens at the API layer.
    AlreadyExists(WebhookEvent),
}

#[derive(Debug, Clone, Error)]
pub enum SettlementLedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("A concurrent transition won the version race for order {0}")]
    VersionConflict(OrderId),
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("The webhook event {0} does not exist")]
    WebhookEventNotFound(String),
}

impl From<sqlx::Error> for SettlementLedgerError {
    fn from(e: sqlx::Error) -> Self {
        SettlementLedgerError::DatabaseError(e.to_string())
    }
}
