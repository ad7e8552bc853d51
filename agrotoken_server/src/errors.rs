use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use agrotoken_engine::{MediaStoreError, PriceStoreError, SettlementLedgerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The chain backend is unavailable. {0}")]
    ChainError(String),
    #[error("The pinning gateway is unavailable. {0}")]
    PinningError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::ChainError(_) => StatusCode::BAD_GATEWAY,
            Self::PinningError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<SettlementLedgerError> for ServerError {
    fn from(e: SettlementLedgerError) -> Self {
        match e {
            SettlementLedgerError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            other => Self::BackendError(other.to_string()),
        }
    }
}

impl From<PriceStoreError> for ServerError {
    fn from(e: PriceStoreError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<MediaStoreError> for ServerError {
    fn from(e: MediaStoreError) -> Self {
        match e {
            MediaStoreError::AssetNotFound(id) => Self::NoRecordFound(format!("Media asset {id}")),
            other => Self::BackendError(other.to_string()),
        }
    }
}
