use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{LedgerEvent, NewOrder, Order, OrderId, OrderStatusType};

/// Inserts the order into the database, returning `false` in the second element if the order already exists.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<(Order, bool), sqlx::Error> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, buyer_id, crop_id, amount, currency, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.buyer_id)
    .bind(order.crop_id)
    .bind(order.amount.value())
    .bind(order.currency)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches up to `limit` orders in the given state, oldest first.
pub async fn fetch_orders_in_state(
    status: OrderStatusType,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE status = $1 ORDER BY created_at ASC LIMIT $2")
        .bind(status)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Applies the already-validated transition as a compare-and-swap on the version counter.
///
/// The status, the reference field carried by the event, and the version move in a single UPDATE, so an order's
/// state and its payment/mint references can never diverge. The row is read back via RETURNING, so the caller
/// sees exactly the state this transition wrote, not whatever a concurrent writer did afterwards. Returns `None`
/// if a concurrent writer won the race (zero rows matched the expected version).
pub async fn apply_transition(
    order_id: &OrderId,
    event: &LedgerEvent,
    next: OrderStatusType,
    expected_version: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let payment_ref = match event {
        LedgerEvent::PaymentCaptured { payment_ref } => Some(payment_ref.clone()),
        _ => None,
    };
    let mint_txid = match event {
        LedgerEvent::MintConfirmed { txid } => Some(txid.clone()),
        _ => None,
    };
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                payment_ref = COALESCE($2, payment_ref),
                mint_txid = COALESCE($3, mint_txid),
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $4 AND version = $5
            RETURNING *;
        "#,
    )
    .bind(next)
    .bind(payment_ref)
    .bind(mint_txid)
    .bind(order_id.as_str())
    .bind(expected_version)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
