//! Storage traits for the settlement engine.
//!
//! Backends implement these traits to act as the durable store behind the public APIs. The engine ships a SQLite
//! implementation; the APIs themselves are backend-agnostic.
mod media_store;
mod price_store;
mod settlement_ledger;

pub use media_store::{MediaStore, MediaStoreError};
pub use price_store::{PriceStore, PriceStoreError};
pub use settlement_ledger::{InsertEventResult, SettlementLedgerDatabase, SettlementLedgerError, TransitionOutcome};
