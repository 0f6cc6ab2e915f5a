//! Mapping of engine errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medtrip_core::CoreError;
use serde::Serialize;
use utoipa::ToSchema;

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable tag, e.g. `conflict` or `forbidden`.
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Core(e) => match e {
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<medtrip_core::types::TextError> for ApiError {
    fn from(e: medtrip_core::types::TextError) -> Self {
        ApiError::Core(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Unauthenticated(message) => ErrorBody {
                error: "unauthenticated".into(),
                message: message.clone(),
            },
            ApiError::Core(CoreError::Internal(detail)) => {
                tracing::error!(error = %detail, "request failed");
                ErrorBody {
                    error: "internal".into(),
                    message: "internal server error".into(),
                }
            }
            ApiError::Core(e) => ErrorBody {
                error: e.kind().into(),
                message: e.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
