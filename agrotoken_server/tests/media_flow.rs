//! Exercises the media upload glue against a real database and an unreachable pinning gateway.
use agrotoken_engine::{
    db_types::{NewMediaAsset, PinStatus},
    MediaApi,
    MediaStore,
};
use agrotoken_server::{errors::ServerError, integrations::pinning::upload_crop_media};
use agt_common::Secret;
use pinning_tools::{content_id, PinningApi, PinningConfig};

mod support;

/// A gateway client pointed at a port nothing listens on. Every pin attempt fails fast.
fn dead_gateway() -> PinningApi {
    let config =
        PinningConfig { gateway_url: "http://127.0.0.1:1".to_string(), api_key: Secret::new("unused".to_string()) };
    PinningApi::new(config).expect("Error building the pinning client")
}

#[tokio::test]
async fn a_failed_first_pin_leaves_no_record_behind() {
    let db = support::prepare_test_db().await;
    let media = MediaApi::new(db.clone());
    let bytes = b"field of wheat at dawn".to_vec();
    let id = content_id(&bytes);
    let result = upload_crop_media(&dead_gateway(), &media, "crop-7", "image/jpeg", bytes).await;
    assert!(matches!(result, Err(ServerError::PinningError(_))), "Expected a pinning failure, got {result:?}");
    let asset = media.fetch_asset(&id).await.expect("Error fetching asset");
    assert!(asset.is_none(), "No record may exist for content the provider never accepted");
}

#[tokio::test]
async fn a_failed_repin_marks_the_stale_record_failed() {
    let db = support::prepare_test_db().await;
    let media = MediaApi::new(db.clone());
    let bytes = b"field of maize at noon".to_vec();
    let id = content_id(&bytes);
    // An earlier upload died between registering the record and completing the pin.
    let stale = NewMediaAsset {
        content_id: id.clone(),
        crop_id: "crop-9".to_string(),
        size: bytes.len() as i64,
        mime_type: "image/jpeg".to_string(),
        pin_status: PinStatus::Pending,
    };
    db.register_asset(stale).await.expect("Error seeding the stale record");

    let result = upload_crop_media(&dead_gateway(), &media, "crop-9", "image/jpeg", bytes).await;
    assert!(matches!(result, Err(ServerError::PinningError(_))), "Expected a pinning failure, got {result:?}");
    let asset = media.fetch_asset(&id).await.expect("Error fetching asset").expect("The seeded record must survive");
    assert_eq!(asset.pin_status, PinStatus::Failed);
    // A failed record is never offered to the mint path.
    let mintable = media.pinned_asset_for_crop("crop-9").await.expect("Error fetching pinned asset");
    assert!(mintable.is_none());
}
