use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use kindle_crypto::CryptoError;
use kindle_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("entropy payload must be {expected} bytes, got {actual}")]
    InvalidEntropySize { expected: usize, actual: usize },

    #[error("entropy payload is degenerate (all 0x00 or all 0xFF)")]
    DegenerateEntropy,

    #[error("entropy value was already submitted")]
    ReplayedEntropy,

    #[error("entropy store unavailable: {0}")]
    EntropyUnavailable(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("not allowed to modify this resource")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidEntropySize { .. } | ApiError::DegenerateEntropy => StatusCode::BAD_REQUEST,
            ApiError::ReplayedEntropy | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::EntropyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Crypto(CryptoError::DecryptionIntegrityFailure) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Crypto(CryptoError::EncryptionFailed) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Crypto(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidEntropySize { .. } => "invalid_entropy_size",
            ApiError::DegenerateEntropy => "degenerate_entropy",
            ApiError::ReplayedEntropy => "replayed_entropy",
            ApiError::EntropyUnavailable(_) => "entropy_unavailable",
            ApiError::Crypto(CryptoError::KeyDerivationInputInvalid(_)) => "key_derivation_input_invalid",
            ApiError::Crypto(CryptoError::DecryptionIntegrityFailure) => "decryption_integrity_failure",
            ApiError::Crypto(CryptoError::TransportEncodingError(_)) => "transport_encoding",
            ApiError::Crypto(CryptoError::EncryptionFailed) => "encryption_failed",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Wrap a blocking-task join failure.
    pub(crate) fn join(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("spawn_blocking join error: {}", e))
    }

    pub(crate) fn db(e: anyhow::Error) -> Self {
        ApiError::Internal(format!("database: {}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        // Internal details stay in the log
        let message = match &self {
            ApiError::Internal(_) => "internal server error".to_string(),
            ApiError::EntropyUnavailable(_) => "entropy store unavailable".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: self.code().to_string(),
            }),
        )
            .into_response()
    }
}
