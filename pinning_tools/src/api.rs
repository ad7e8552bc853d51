use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Deserialize;

use crate::{helpers::content_id, PinningApiError, PinningConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct PinReceipt {
    pub content_id: String,
    pub size: u64,
}

#[derive(Clone)]
pub struct PinningApi {
    config: PinningConfig,
    client: Arc<Client>,
}

impl PinningApi {
    pub fn new(config: PinningConfig) -> Result<Self, PinningApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(config.api_key.reveal().as_str())
            .map_err(|e| PinningApiError::Initialization(e.to_string()))?;
        headers.insert("X-Api-Key", val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PinningApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.config.gateway_url)
    }

    /// Pins a blob under its content-derived id. The gateway stores the bytes keyed by the id we compute, so
    /// pinning the same bytes twice is a cheap no-op on its side.
    pub async fn pin(&self, bytes: Vec<u8>) -> Result<PinReceipt, PinningApiError> {
        let id = content_id(&bytes);
        let url = self.url(&format!("/pins/{id}"));
        debug!("🖼️ Pinning {} bytes as {id}", bytes.len());
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PinningApiError::Unavailable(e.to_string()))?;
        if response.status().is_success() {
            let receipt = response.json::<PinReceipt>().await.map_err(|e| PinningApiError::JsonError(e.to_string()))?;
            info!("🖼️ Pinned {} ({} bytes)", receipt.content_id, receipt.size);
            Ok(receipt)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PinningApiError::Unavailable(e.to_string()))?;
            Err(PinningApiError::PinError { status, message })
        }
    }
}
