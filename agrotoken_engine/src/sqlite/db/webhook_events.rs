use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{NewWebhookEvent, WebhookEvent, WebhookOutcome};

/// Records the event with `Pending` outcome. If the event id is already on record, the existing row is returned
/// untouched and the second element is `false`. The audit log is append-only; only the outcome ever changes.
pub async fn idempotent_insert(
    event: NewWebhookEvent,
    conn: &mut SqliteConnection,
) -> Result<(WebhookEvent, bool), sqlx::Error> {
    // ON CONFLICT DO NOTHING keeps two concurrent deliveries of the same event id from racing each other into a
    // constraint error; exactly one insert wins and the loser reads the winner's row.
    let inserted: Option<WebhookEvent> = sqlx::query_as(
        r#"
            INSERT INTO webhook_events (event_id, payload_digest)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(&event.event_id)
    .bind(&event.payload_digest)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(event) => Ok((event, true)),
        None => {
            let existing = fetch_by_event_id(&event.event_id, conn)
                .await?
                .ok_or_else(|| sqlx::Error::RowNotFound)?;
            trace!("📨️ Webhook event [{}] already on record with outcome {}", existing.event_id, existing.outcome);
            Ok((existing, false))
        },
    }
}

pub async fn fetch_by_event_id(
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEvent>, sqlx::Error> {
    let event = sqlx::query_as("SELECT * FROM webhook_events WHERE event_id = $1")
        .bind(event_id)
        .fetch_optional(conn)
        .await?;
    Ok(event)
}

pub async fn set_outcome(
    event_id: &str,
    outcome: WebhookOutcome,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE webhook_events SET outcome = $1 WHERE event_id = $2")
        .bind(outcome)
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
