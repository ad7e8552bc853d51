use log::*;
use agt_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct PinningConfig {
    pub gateway_url: String,
    pub api_key: Secret<String>,
}

impl PinningConfig {
    pub fn new_from_env_or_default() -> Self {
        let gateway_url = std::env::var("AGT_PINNING_GATEWAY_URL").unwrap_or_else(|_| {
            warn!("AGT_PINNING_GATEWAY_URL not set, using http://localhost:5001 as default");
            "http://localhost:5001".to_string()
        });
        let api_key = Secret::from_env("AGT_PINNING_API_KEY");
        Self { gateway_url, api_key }
    }
}
