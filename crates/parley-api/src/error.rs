//! API error types and JSON error response formatting.
//!
//! Every failure is returned as
//! `{"success": false, "error": <code>, "message": <text>}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use parley_chat::ChatError;
use parley_storage::StorageError;

/// Shown to clients when the model provider is temporarily unreachable.
pub const UNAVAILABLE_MESSAGE: &str =
    "AI service temporarily unavailable. Please try again in a few seconds.";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    /// Machine-readable error code (e.g. "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 401 Unauthorized - missing or unknown bearer token.
    Unauthorized(String),
    /// 404 Not Found - resource does not exist or belongs to someone else.
    NotFound(String),
    /// 500 Internal Server Error.
    Internal(String),
    /// 503 Service Unavailable - upstream model temporarily unreachable.
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn chat_not_found() -> Self {
        ApiError::NotFound("Chat not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            success: false,
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        if err.is_service_unavailable() {
            warn!(error = %err, "Model provider unavailable");
            return ApiError::ServiceUnavailable(UNAVAILABLE_MESSAGE.to_string());
        }
        match err {
            ChatError::EmptyMessage => ApiError::BadRequest(err.to_string()),
            ChatError::ConversationNotFound(_) => ApiError::chat_not_found(),
            ChatError::Upstream(_) | ChatError::Storage(_) => {
                error!(error = %err, "Message handling failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        error!(error = %err, "Storage failure");
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
