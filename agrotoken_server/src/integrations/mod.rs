pub mod pinning;
pub mod price_feed;
