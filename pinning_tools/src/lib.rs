mod api;
mod config;
mod error;
mod helpers;

pub use api::{PinReceipt, PinningApi};
pub use config::PinningConfig;
pub use error::PinningApiError;
pub use helpers::content_id;
