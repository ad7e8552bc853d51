pub mod media_api;
pub mod price_api;
pub mod settlement_api;
