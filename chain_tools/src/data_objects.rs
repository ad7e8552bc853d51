use agt_common::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request to mint one crop token. The `order_id` doubles as the idempotency key on the contract side, so
/// resubmitting the same request can never create a second token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub order_id: String,
    pub recipient: String,
    pub metadata: TokenMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub crop_id: String,
    pub amount: Cents,
    pub currency: String,
    /// Content id of the pinned media attached to the token, if any.
    pub media_content_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintReceipt {
    pub order_id: String,
    pub txid: String,
    pub token_id: u64,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInfo {
    pub address: String,
    pub network_id: String,
    pub name: String,
    pub symbol: String,
    pub total_minted: u64,
}
