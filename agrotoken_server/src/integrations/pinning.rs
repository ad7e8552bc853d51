//! Glue between the media routes, the pinning gateway and the media store.

use agrotoken_engine::{
    db_types::{NewMediaAsset, PinStatus},
    MediaApi,
    MediaStore,
};
use log::*;
use pinning_tools::{content_id, PinningApi};

use crate::{data_objects::MediaUploadResult, errors::ServerError};

/// Pins a blob of crop media and records it in the media store. The content id is derived from the bytes, so
/// re-uploading identical content short-circuits to the existing pinned record without touching the gateway.
pub async fn upload_crop_media<B: MediaStore>(
    pinning: &PinningApi,
    media: &MediaApi<B>,
    crop_id: &str,
    mime_type: &str,
    bytes: Vec<u8>,
) -> Result<MediaUploadResult, ServerError> {
    let id = content_id(&bytes);
    let mut prior_record = false;
    if let Some(existing) = media.fetch_asset(&id).await? {
        if existing.pin_status == PinStatus::Pinned {
            debug!("🖼️ Media {id} is already pinned, reusing the existing record");
            return Ok(MediaUploadResult { content_id: id, crop_id: existing.crop_id, newly_pinned: false });
        }
        debug!("🖼️ Media {id} exists but is not pinned, retrying the pin");
        prior_record = true;
    }
    let size = bytes.len() as i64;
    if let Err(e) = pinning.pin(bytes).await {
        warn!("🖼️ Could not pin media {id} for crop {crop_id}. {e}");
        // An orphaned record must not sit at Pending forever; mark it so the mint path never picks it up.
        if prior_record {
            media.mark_failed(&id).await?;
        }
        return Err(ServerError::PinningError(e.to_string()));
    }
    let asset = NewMediaAsset {
        content_id: id.clone(),
        crop_id: crop_id.to_string(),
        size,
        mime_type: mime_type.to_string(),
        pin_status: PinStatus::Pinned,
    };
    let (asset, inserted) = media.register_pinned(asset).await?;
    info!("🖼️ Pinned media {} for crop {}", asset.content_id, asset.crop_id);
    Ok(MediaUploadResult { content_id: asset.content_id, crop_id: asset.crop_id, newly_pinned: inserted })
}
