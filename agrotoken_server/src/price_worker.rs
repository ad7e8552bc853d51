//! Polls the upstream commodity feed on a fixed cadence and writes fresh quotes into the price store.

use std::time::Duration;

use agrotoken_engine::{db_types::PriceQuote, events::EventProducers, PriceApi, SqliteDatabase};
use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

use crate::{
    config::PriceConfig,
    integrations::price_feed::{CommodityFeedClient, PriceSource},
};

/// Starts the price poller. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_price_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    config: PriceConfig,
    source: CommodityFeedClient,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.poll_interval);
        let api = PriceApi::new(db, producers);
        info!("💹️ Price poller started for [{}]", config.symbols.join(", "));
        loop {
            timer.tick().await;
            let quotes = collect_fresh_quotes(&source, &config.symbols, config.freshness_threshold).await;
            if let Err(e) = api.replace_quotes(quotes).await {
                error!("💹️ Could not store the fetched quotes: {e}");
            }
        }
    })
}

/// Fetches a quote for every symbol, discarding stale ones. One symbol failing never affects the others;
/// its stored quote simply stays as it was.
pub async fn collect_fresh_quotes<S: PriceSource>(
    source: &S,
    symbols: &[String],
    freshness_threshold: Duration,
) -> Vec<PriceQuote> {
    let mut fresh = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match source.fetch_quote(symbol).await {
            Ok(quote) => {
                let age = Utc::now().signed_duration_since(quote.quoted_at);
                if age.to_std().map(|age| age > freshness_threshold).unwrap_or(false) {
                    warn!("💹️ Discarding stale quote for {symbol} ({}s old)", age.num_seconds());
                    continue;
                }
                fresh.push(quote);
            },
            Err(e) => {
                warn!("💹️ Could not fetch a quote for {symbol}: {e}");
            },
        }
    }
    fresh
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use agt_common::Cents;
    use agrotoken_engine::db_types::PriceQuote;
    use chrono::Utc;

    use super::collect_fresh_quotes;
    use crate::integrations::price_feed::{PriceFeedError, PriceSource};

    /// Serves canned quotes; symbols without a script return an error.
    struct StubFeed {
        quotes: Vec<PriceQuote>,
    }

    impl PriceSource for StubFeed {
        async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote, PriceFeedError> {
            self.quotes.iter().find(|q| q.symbol == symbol).cloned().ok_or_else(|| PriceFeedError::Unavailable(
                format!("no quote for {symbol}"),
            ))
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn stale_quotes_are_discarded() {
        let feed = StubFeed {
            quotes: vec![
                PriceQuote::new("WHEAT", Cents::from_whole(210), Utc::now() - chrono::Duration::hours(2)),
                PriceQuote::new("MAIZE", Cents::from_whole(180), Utc::now()),
            ],
        };
        let fresh = collect_fresh_quotes(&feed, &symbols(&["WHEAT", "MAIZE"]), Duration::from_secs(300)).await;
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].symbol, "MAIZE");
    }

    #[tokio::test]
    async fn one_symbol_failing_does_not_affect_the_others() {
        let feed = StubFeed {
            quotes: vec![
                PriceQuote::new("WHEAT", Cents::from_whole(210), Utc::now()),
                PriceQuote::new("SOY", Cents::from_whole(450), Utc::now()),
            ],
        };
        let fresh = collect_fresh_quotes(&feed, &symbols(&["WHEAT", "MAIZE", "SOY"]), Duration::from_secs(300)).await;
        let got = fresh.iter().map(|q| q.symbol.as_str()).collect::<Vec<_>>();
        assert_eq!(got, vec!["WHEAT", "SOY"]);
    }

    #[tokio::test]
    async fn a_cycle_with_no_reachable_symbols_yields_nothing() {
        let feed = StubFeed { quotes: vec![] };
        let fresh = collect_fresh_quotes(&feed, &symbols(&["WHEAT"]), Duration::from_secs(300)).await;
        assert!(fresh.is_empty());
    }
}
