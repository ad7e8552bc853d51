use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{ChainApiError, ChainConfig, ContractInfo, MintReceipt, MintRequest};

/// The minimal surface the tokenization worker needs from a chain node. Mint submissions can time out on the
/// client side while still landing on chain, so every backend must also be able to answer "did this order's
/// mint actually go through?" via [`MintBackend::find_minted`].
#[allow(async_fn_in_trait)]
pub trait MintBackend {
    async fn mint(&self, request: &MintRequest) -> Result<MintReceipt, ChainApiError>;
    async fn find_minted(&self, order_id: &str) -> Result<Option<MintReceipt>, ChainApiError>;
}

#[derive(Clone)]
pub struct ChainApi {
    config: ChainConfig,
    client: Arc<Client>,
}

impl ChainApi {
    pub fn new(config: ChainConfig) -> Result<Self, ChainApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.signer_key.reveal().as_str())
            .map_err(|e| ChainApiError::Initialization(e.to_string()))?;
        headers.insert("X-Signer-Key", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ChainApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rpc_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, ChainApiError> {
        let url = self.url(path);
        trace!("⛓️ Sending RPC query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| ChainApiError::RpcResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("⛓️ RPC query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ChainApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ChainApiError::RpcResponseError(e.to_string()))?;
            Err(ChainApiError::MintError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1/contracts/{}{path}", self.config.rpc_url, self.config.contract_address)
    }

    pub async fn contract_info(&self) -> Result<ContractInfo, ChainApiError> {
        debug!("⛓️ Fetching contract info for {}", self.config.contract_address);
        self.rpc_query::<ContractInfo, ()>(Method::GET, "", None).await
    }
}

impl MintBackend for ChainApi {
    async fn mint(&self, request: &MintRequest) -> Result<MintReceipt, ChainApiError> {
        debug!("⛓️ Submitting mint for order {}", request.order_id);
        let receipt = self.rpc_query::<MintReceipt, _>(Method::POST, "/mint", Some(request)).await?;
        info!("⛓️ Mint for order {} confirmed in tx {}", receipt.order_id, receipt.txid);
        Ok(receipt)
    }

    async fn find_minted(&self, order_id: &str) -> Result<Option<MintReceipt>, ChainApiError> {
        let path = format!("/mints/{order_id}");
        trace!("⛓️ Looking up existing mint for order {order_id}");
        match self.rpc_query::<MintReceipt, ()>(Method::GET, &path, None).await {
            Ok(receipt) => Ok(Some(receipt)),
            Err(ChainApiError::MintError { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
