use log::*;
use agt_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub network_id: String,
    pub signer_key: Secret<String>,
}

impl ChainConfig {
    pub fn new_from_env_or_default() -> Self {
        let rpc_url = std::env::var("AGT_CHAIN_RPC_URL").unwrap_or_else(|_| {
            warn!("AGT_CHAIN_RPC_URL not set, using http://localhost:8545 as default");
            "http://localhost:8545".to_string()
        });
        let contract_address = std::env::var("AGT_CHAIN_CONTRACT_ADDRESS").unwrap_or_else(|_| {
            warn!("AGT_CHAIN_CONTRACT_ADDRESS not set, using (probably useless) default");
            "0x0000000000000000000000000000000000000000".to_string()
        });
        let network_id = std::env::var("AGT_CHAIN_NETWORK_ID").unwrap_or_else(|_| {
            warn!("AGT_CHAIN_NETWORK_ID not set, using testnet as default");
            "testnet".to_string()
        });
        let signer_key = Secret::from_env("AGT_CHAIN_SIGNER_KEY");
        Self { rpc_url, contract_address, network_id, signer_key }
    }
}
