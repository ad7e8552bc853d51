mod api;
mod config;
mod error;

mod data_objects;

pub use api::{ChainApi, MintBackend};
pub use config::ChainConfig;
pub use data_objects::{ContractInfo, MintReceipt, MintRequest, TokenMetadata};
pub use error::ChainApiError;
