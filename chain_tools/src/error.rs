use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid RPC response: {0}")]
    RpcResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Mint call failed. Error {status}. {message}")]
    MintError { status: u16, message: String },
}
