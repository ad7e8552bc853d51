//! AgroToken Settlement Engine
//!
//! The settlement engine is the single source of truth for "has this crop purchase been paid for and tokenized".
//! It reconciles events that arrive out of order and at least once (payment gateway webhooks, on-chain mint
//! confirmations) against a durable order record, while guaranteeing that exactly-once side effects such as
//! minting the crop token are neither duplicated nor lost.
//!
//! The library is divided into three main sections:
//! 1. Database types and storage traits ([`db_types`], [`traits`]). SQLite (via sqlx) is the supported backend.
//!    Callers should never touch the database directly; use the public APIs instead.
//! 2. The public API layer ([`ledger_api`]): [`SettlementApi`] for order and webhook flows, [`PriceApi`] for
//!    commodity quotes and [`MediaApi`] for content-addressed crop media records.
//! 3. A pub-sub event layer ([`events`]) through which state changes (order transitions, price updates) are pushed
//!    to interested subscribers, such as the realtime broadcaster.
pub mod db_types;
pub mod events;
pub mod state_machine;
pub mod traits;

mod ledger_api;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use ledger_api::{
    media_api::MediaApi,
    price_api::PriceApi,
    settlement_api::{IngestOutcome, SettlementApi, WebhookNotification},
};
#[cfg(feature = "sqlite")]
pub use sqlite::{run_migrations, SqliteDatabase};
pub use traits::{
    InsertEventResult,
    MediaStore,
    MediaStoreError,
    PriceStore,
    PriceStoreError,
    SettlementLedgerDatabase,
    SettlementLedgerError,
    TransitionOutcome,
};
