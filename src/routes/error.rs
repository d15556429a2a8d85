use actix_web::http::StatusCode;
use actix_web::{error, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;

use crate::error::EngineError;
use crate::models::ErrorResponse;
use crate::services::SourceError;

/// Anything a handler can fail with, mapped onto a JSON error body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Resident source error: {0}")]
    Source(#[from] SourceError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid {kind}: {message}")]
    Payload { kind: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Malformed JSON bodies answer with the same error body as handler failures
pub fn json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    ApiError::Payload { kind: "json", message: err.to_string() }.into()
}

pub fn query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Payload { kind: "query", message: err.to_string() }.into()
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::NotInitialized(_) => "not_initialized",
                EngineError::NotFound(_) => "not_found",
                EngineError::InvalidPair(_) => "invalid_pair",
                EngineError::InvalidParameter(_) => "invalid_parameter",
                EngineError::EmptyPopulation => "empty_population",
                EngineError::EncodingFailure(_) => "encoding_failure",
                EngineError::Training(_) => "training_failed",
                EngineError::Persistence(_) => "persistence_error",
            },
            ApiError::Source(_) => "source_error",
            ApiError::Validation(_) => "validation_failed",
            ApiError::Payload { kind: "query", .. } => "invalid_query",
            ApiError::Payload { .. } => "invalid_json",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::InvalidPair(_) | EngineError::InvalidParameter(_) | EngineError::EncodingFailure(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::NotInitialized(_) => StatusCode::CONFLICT,
                EngineError::EmptyPopulation => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Training(_) | EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) | ApiError::Payload { .. } => StatusCode::BAD_REQUEST,
            ApiError::Source(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::debug!(code = self.code(), "{}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}
