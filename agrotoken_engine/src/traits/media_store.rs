use thiserror::Error;

use crate::db_types::{MediaAsset, NewMediaAsset, PinStatus};

#[derive(Debug, Clone, Error)]
pub enum MediaStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The media asset {0} does not exist")]
    AssetNotFound(String),
}

impl From<sqlx::Error> for MediaStoreError {
    fn from(e: sqlx::Error) -> Self {
        MediaStoreError::DatabaseError(e.to_string())
    }
}

/// Content-addressed media asset records. The content id is the natural primary key, so registering the same
/// bytes twice can never create a second record.
#[allow(async_fn_in_trait)]
pub trait MediaStore: Clone {
    /// Stores the asset, returning `false` in the second element if a record with this content id already existed.
    async fn register_asset(&self, asset: NewMediaAsset) -> Result<(MediaAsset, bool), MediaStoreError>;

    /// Fetches the asset for a content id.
    async fn fetch_asset(&self, content_id: &str) -> Result<Option<MediaAsset>, MediaStoreError>;

    /// The most recently registered pinned asset for a crop, if any.
    async fn fetch_pinned_asset_for_crop(&self, crop_id: &str) -> Result<Option<MediaAsset>, MediaStoreError>;

    /// Updates the pin status for an asset.
    async fn set_pin_status(&self, content_id: &str, status: PinStatus) -> Result<(), MediaStoreError>;
}
