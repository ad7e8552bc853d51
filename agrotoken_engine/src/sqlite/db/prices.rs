use sqlx::SqliteConnection;

use crate::db_types::PriceQuote;

/// Replaces the stored quote for the symbol in a single statement. A fetch failure upstream never reaches this
/// function, so stale quotes are only ever overwritten by fresh ones, never cleared.
pub async fn upsert_quote(quote: &PriceQuote, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO price_quotes (symbol, price, currency, quoted_at, fetched_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (symbol) DO UPDATE SET
                price = excluded.price,
                currency = excluded.currency,
                quoted_at = excluded.quoted_at,
                fetched_at = excluded.fetched_at
        "#,
    )
    .bind(&quote.symbol)
    .bind(quote.price.value())
    .bind(&quote.currency)
    .bind(quote.quoted_at)
    .bind(quote.fetched_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_quote(symbol: &str, conn: &mut SqliteConnection) -> Result<Option<PriceQuote>, sqlx::Error> {
    let quote =
        sqlx::query_as("SELECT * FROM price_quotes WHERE symbol = $1").bind(symbol).fetch_optional(conn).await?;
    Ok(quote)
}

pub async fn fetch_all_quotes(conn: &mut SqliteConnection) -> Result<Vec<PriceQuote>, sqlx::Error> {
    let quotes = sqlx::query_as("SELECT * FROM price_quotes ORDER BY symbol ASC").fetch_all(conn).await?;
    Ok(quotes)
}
