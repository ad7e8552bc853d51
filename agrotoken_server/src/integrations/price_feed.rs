//! Client for the upstream commodity price feed.

use agt_common::Cents;
use agrotoken_engine::db_types::PriceQuote;
use chrono::{DateTime, Utc};
use log::*;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("Could not initialize feed client: {0}")]
    Initialization(String),
    #[error("The price feed is unavailable: {0}")]
    Unavailable(String),
    #[error("Could not deserialize feed response: {0}")]
    JsonError(String),
    #[error("Feed query for {symbol} failed. Error {status}. {message}")]
    QueryError { symbol: String, status: u16, message: String },
}

/// Anything that can produce a fresh quote for a commodity symbol. The production implementation is
/// [`CommodityFeedClient`]; the poller tests substitute their own.
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote, PriceFeedError>;
}

#[derive(Debug, Clone, Deserialize)]
struct FeedQuote {
    symbol: String,
    price_cents: i64,
    #[serde(default)]
    currency: Option<String>,
    quoted_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CommodityFeedClient {
    feed_url: String,
    client: Client,
}

impl CommodityFeedClient {
    pub fn new(feed_url: &str) -> Result<Self, PriceFeedError> {
        let client = Client::builder().build().map_err(|e| PriceFeedError::Initialization(e.to_string()))?;
        Ok(Self { feed_url: feed_url.trim_end_matches('/').to_string(), client })
    }
}

impl PriceSource for CommodityFeedClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote, PriceFeedError> {
        let url = format!("{}/quotes/{symbol}", self.feed_url);
        trace!("💹️ Fetching quote: {url}");
        let response = self.client.get(url).send().await.map_err(|e| PriceFeedError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PriceFeedError::Unavailable(e.to_string()))?;
            return Err(PriceFeedError::QueryError { symbol: symbol.to_string(), status, message });
        }
        let quote = response.json::<FeedQuote>().await.map_err(|e| PriceFeedError::JsonError(e.to_string()))?;
        let mut result = PriceQuote::new(quote.symbol, Cents::from(quote.price_cents), quote.quoted_at);
        if let Some(currency) = quote.currency {
            result.currency = currency;
        }
        Ok(result)
    }
}
