//! `SqliteDatabase` is the concrete settlement-engine backend. It implements all the storage traits defined in
//! the [`crate::traits`] module on top of a sqlx connection pool.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{media, new_pool, orders, prices, webhook_events};
use crate::{
    db_types::{
        LedgerEvent,
        MediaAsset,
        NewMediaAsset,
        NewOrder,
        NewWebhookEvent,
        Order,
        OrderId,
        OrderStatusType,
        PinStatus,
        PriceQuote,
        WebhookEvent,
        WebhookOutcome,
    },
    state_machine,
    state_machine::Transition,
    traits::{
        InsertEventResult,
        MediaStore,
        MediaStoreError,
        PriceStore,
        PriceStoreError,
        SettlementLedgerDatabase,
        SettlementLedgerError,
        TransitionOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool for the given URL and returns a new instance of `SqliteDatabase`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementLedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let (order, inserted) = orders::idempotent_insert(order, &mut conn).await?;
        if inserted {
            debug!("🗃️ Order {} has been saved in the ledger with id {}", order.order_id, order.id);
        }
        Ok((order, inserted))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_in_state(
        &self,
        status: OrderStatusType,
        limit: i64,
    ) -> Result<Vec<Order>, SettlementLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_in_state(status, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn transition(
        &self,
        order_id: &OrderId,
        event: LedgerEvent,
        expected_version: i64,
    ) -> Result<TransitionOutcome, SettlementLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| SettlementLedgerError::OrderNotFound(order_id.clone()))?;
        // A caller holding a stale read is told so before we even consult the state machine.
        if order.version != expected_version {
            return Err(SettlementLedgerError::VersionConflict(order_id.clone()));
        }
        let next = match state_machine::next_state(order.status, &event)? {
            Transition::NoOp => {
                trace!("🗃️ Event '{}' on order {} is a no-op at state {}", event.name(), order_id, order.status);
                return Ok(TransitionOutcome::NoOp(order));
            },
            Transition::Move(next) => next,
        };
        let order = orders::apply_transition(order_id, &event, next, expected_version, &mut conn)
            .await?
            .ok_or_else(|| SettlementLedgerError::VersionConflict(order_id.clone()))?;
        debug!(
            "🗃️ Order {} moved to {} (version {}) on event '{}'",
            order_id,
            order.status,
            order.version,
            event.name()
        );
        Ok(TransitionOutcome::Applied(order))
    }

    async fn insert_webhook_event(&self, event: NewWebhookEvent) -> Result<InsertEventResult, SettlementLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let (event, inserted) = webhook_events::idempotent_insert(event, &mut conn).await?;
        let result =
            if inserted { InsertEventResult::Inserted(event) } else { InsertEventResult::AlreadyExists(event) };
        Ok(result)
    }

    async fn set_webhook_outcome(
        &self,
        event_id: &str,
        outcome: WebhookOutcome,
    ) -> Result<(), SettlementLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let updated = webhook_events::set_outcome(event_id, outcome, &mut conn).await?;
        if !updated {
            return Err(SettlementLedgerError::WebhookEventNotFound(event_id.to_string()));
        }
        Ok(())
    }

    async fn fetch_webhook_event(&self, event_id: &str) -> Result<Option<WebhookEvent>, SettlementLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let event = webhook_events::fetch_by_event_id(event_id, &mut conn).await?;
        Ok(event)
    }
}

impl PriceStore for SqliteDatabase {
    async fn upsert_quote(&self, quote: &PriceQuote) -> Result<(), PriceStoreError> {
        let mut conn = self.pool.acquire().await?;
        prices::upsert_quote(quote, &mut conn).await?;
        Ok(())
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<PriceQuote>, PriceStoreError> {
        let mut conn = self.pool.acquire().await?;
        let quote = prices::fetch_quote(symbol, &mut conn).await?;
        Ok(quote)
    }

    async fn fetch_all_quotes(&self) -> Result<Vec<PriceQuote>, PriceStoreError> {
        let mut conn = self.pool.acquire().await?;
        let quotes = prices::fetch_all_quotes(&mut conn).await?;
        Ok(quotes)
    }
}

impl MediaStore for SqliteDatabase {
    async fn register_asset(&self, asset: NewMediaAsset) -> Result<(MediaAsset, bool), MediaStoreError> {
        let mut conn = self.pool.acquire().await?;
        let (asset, inserted) = media::idempotent_insert(asset, &mut conn).await?;
        Ok((asset, inserted))
    }

    async fn fetch_asset(&self, content_id: &str) -> Result<Option<MediaAsset>, MediaStoreError> {
        let mut conn = self.pool.acquire().await?;
        let asset = media::fetch_asset(content_id, &mut conn).await?;
        Ok(asset)
    }

    async fn fetch_pinned_asset_for_crop(&self, crop_id: &str) -> Result<Option<MediaAsset>, MediaStoreError> {
        let mut conn = self.pool.acquire().await?;
        let asset = media::fetch_pinned_asset_for_crop(crop_id, &mut conn).await?;
        Ok(asset)
    }

    async fn set_pin_status(&self, content_id: &str, status: PinStatus) -> Result<(), MediaStoreError> {
        let mut conn = self.pool.acquire().await?;
        let updated = media::set_pin_status(content_id, status, &mut conn).await?;
        if !updated {
            return Err(MediaStoreError::AssetNotFound(content_id.to_string()));
        }
        Ok(())
    }
}
