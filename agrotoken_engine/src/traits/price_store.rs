use thiserror::Error;

use crate::db_types::PriceQuote;

#[derive(Debug, Clone, Error)]
pub enum PriceStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for PriceStoreError {
    fn from(e: sqlx::Error) -> Self {
        PriceStoreError::DatabaseError(e.to_string())
    }
}

/// Latest-quote-per-symbol storage. A symbol's quote is only ever replaced wholesale, never cleared.
#[allow(async_fn_in_trait)]
pub trait PriceStore: Clone {
    /// Atomically replaces the stored quote for the quote's symbol.
    async fn upsert_quote(&self, quote: &PriceQuote) -> Result<(), PriceStoreError>;

    /// The stored quote for a symbol, if any has ever been recorded.
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<PriceQuote>, PriceStoreError>;

    /// All stored quotes, ordered by symbol.
    async fn fetch_all_quotes(&self) -> Result<Vec<PriceQuote>, PriceStoreError>;
}
