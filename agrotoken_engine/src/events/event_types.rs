use serde::{Deserialize, Serialize};

use crate::db_types::{Order, PriceQuote};

/// Emitted after every applied order transition, outside the ledger transaction boundary. Subscribers get the
/// full post-transition record; delivery is eventual and best-effort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStateChangedEvent {
    pub order: Order,
}

impl OrderStateChangedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted once per poller cycle in which at least one quote was replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricesUpdatedEvent {
    pub quotes: Vec<PriceQuote>,
}

impl PricesUpdatedEvent {
    pub fn new(quotes: Vec<PriceQuote>) -> Self {
        Self { quotes }
    }
}
