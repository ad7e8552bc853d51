use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{MediaAsset, NewMediaAsset, PinStatus};

/// Registers the asset, returning `false` in the second element if a record with this content id already exists.
/// The content id is the primary key, so byte-identical uploads always collapse onto one record.
pub async fn idempotent_insert(
    asset: NewMediaAsset,
    conn: &mut SqliteConnection,
) -> Result<(MediaAsset, bool), sqlx::Error> {
    let inserted: Option<MediaAsset> = sqlx::query_as(
        r#"
            INSERT INTO media_assets (content_id, crop_id, size, mime_type, pin_status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (content_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(&asset.content_id)
    .bind(&asset.crop_id)
    .bind(asset.size)
    .bind(&asset.mime_type)
    .bind(asset.pin_status)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(asset) => Ok((asset, true)),
        None => {
            let existing =
                fetch_asset(&asset.content_id, conn).await?.ok_or_else(|| sqlx::Error::RowNotFound)?;
            debug!("🖼️ Media asset [{}] already registered ({})", existing.content_id, existing.pin_status);
            Ok((existing, false))
        },
    }
}

pub async fn fetch_asset(content_id: &str, conn: &mut SqliteConnection) -> Result<Option<MediaAsset>, sqlx::Error> {
    let asset = sqlx::query_as("SELECT * FROM media_assets WHERE content_id = $1")
        .bind(content_id)
        .fetch_optional(conn)
        .await?;
    Ok(asset)
}

pub async fn fetch_pinned_asset_for_crop(
    crop_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<MediaAsset>, sqlx::Error> {
    let asset = sqlx::query_as(
        "SELECT * FROM media_assets WHERE crop_id = $1 AND pin_status = 'Pinned' ORDER BY created_at DESC LIMIT 1",
    )
    .bind(crop_id)
    .fetch_optional(conn)
    .await?;
    Ok(asset)
}

pub async fn set_pin_status(
    content_id: &str,
    status: PinStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE media_assets SET pin_status = $1 WHERE content_id = $2")
        .bind(status)
        .bind(content_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
