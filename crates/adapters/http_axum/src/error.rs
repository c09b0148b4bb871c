//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use irrigo_domain::error::{IrrigoError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_operations: Vec<String>,
}

/// Maps [`IrrigoError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(IrrigoError);

impl From<IrrigoError> for ApiError {
    fn from(err: IrrigoError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(IrrigoError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut failed_operations = Vec::new();
        let (status, message) = match self.0 {
            IrrigoError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            IrrigoError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            IrrigoError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            IrrigoError::EmergencyStop(err) => {
                let message = err.to_string();
                failed_operations = err.failed_operations;
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            other => {
                tracing::error!(error = %other, kind = %other.kind(), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                failed_operations,
            }),
        )
            .into_response()
    }
}
