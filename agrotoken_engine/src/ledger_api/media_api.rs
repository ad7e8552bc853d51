use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{MediaAsset, NewMediaAsset, PinStatus},
    traits::{MediaStore, MediaStoreError},
};

/// Durable records for content-addressed crop media. The pinning network call itself lives at the server boundary;
/// this API guarantees that identical content never produces two records and that a crop's mintable asset is
/// always a `Pinned` one.
pub struct MediaApi<B> {
    db: B,
}

impl<B> Debug for MediaApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MediaApi")
    }
}

impl<B> MediaApi<B>
where B: MediaStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Records a successfully pinned asset. Returns the stored record and `false` if the content id was already
    /// registered (re-upload of identical bytes).
    pub async fn register_pinned(&self, asset: NewMediaAsset) -> Result<(MediaAsset, bool), MediaStoreError> {
        let asset = NewMediaAsset { pin_status: PinStatus::Pinned, ..asset };
        let (mut asset, inserted) = self.db.register_asset(asset).await?;
        if inserted {
            info!("🖼️ Media asset [{}] pinned for crop {}", asset.content_id, asset.crop_id);
        }
        // An earlier failed attempt may have left the record un-pinned. The provider holds the bytes now.
        if !inserted && asset.pin_status != PinStatus::Pinned {
            self.db.set_pin_status(&asset.content_id, PinStatus::Pinned).await?;
            asset.pin_status = PinStatus::Pinned;
        }
        Ok((asset, inserted))
    }

    /// Records that the provider rejected or lost the asset. A crop must never reference an asset in this state.
    pub async fn mark_failed(&self, content_id: &str) -> Result<(), MediaStoreError> {
        warn!("🖼️ Marking media asset [{content_id}] as failed");
        self.db.set_pin_status(content_id, PinStatus::Failed).await
    }

    pub async fn fetch_asset(&self, content_id: &str) -> Result<Option<MediaAsset>, MediaStoreError> {
        self.db.fetch_asset(content_id).await
    }

    /// The pinned asset to embed in a crop's token metadata, if one exists.
    pub async fn pinned_asset_for_crop(&self, crop_id: &str) -> Result<Option<MediaAsset>, MediaStoreError> {
        self.db.fetch_pinned_asset_for_crop(crop_id).await
    }
}
