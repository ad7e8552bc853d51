use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinningApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Pinning service unavailable: {0}")]
    Unavailable(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Pin request failed. Error {status}. {message}")]
    PinError { status: u16, message: String },
}
