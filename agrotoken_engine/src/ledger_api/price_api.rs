//! The PriceApi manages the latest commodity quotes. The poller writes through [`PriceApi::replace_quotes`];
//! read paths never block on, or observe, a fetch in progress.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::PriceQuote,
    events::{EventProducers, PricesUpdatedEvent},
    traits::{PriceStore, PriceStoreError},
};

pub struct PriceApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PriceApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PriceApi")
    }
}

impl<B> PriceApi<B>
where B: PriceStore
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Replaces the stored quote for every symbol in the batch, then notifies `prices` subscribers once. An empty
    /// batch (a cycle in which nothing was fetched successfully) is a no-op and publishes nothing.
    pub async fn replace_quotes(&self, quotes: Vec<PriceQuote>) -> Result<(), PriceStoreError> {
        if quotes.is_empty() {
            return Ok(());
        }
        for quote in &quotes {
            self.db.upsert_quote(quote).await?;
            trace!("💹️ Stored quote {} = {} {}", quote.symbol, quote.price, quote.currency);
        }
        debug!("💹️ {} quotes replaced", quotes.len());
        for emitter in &self.producers.price_producers {
            emitter.publish_event(PricesUpdatedEvent::new(quotes.clone())).await;
        }
        Ok(())
    }

    pub async fn fetch_quote(&self, symbol: &str) -> Result<Option<PriceQuote>, PriceStoreError> {
        self.db.fetch_quote(symbol).await
    }

    pub async fn fetch_all_quotes(&self) -> Result<Vec<PriceQuote>, PriceStoreError> {
        self.db.fetch_all_quotes().await
    }
}
