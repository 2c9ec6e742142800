use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        // Log the error before it gets converted into a status response.
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = ?self, "Request rejected");
        }

        let code = self.code();
        match self {
            // Caller-facing detail only where it cannot leak internals.
            AppError::InvalidInput(msg) => error_resp(status, code, Some(msg)),
            AppError::Database(_)
            | AppError::Upstream(_)
            | AppError::Internal(_)
            | AppError::Configuration(_) => error_resp(status, code, None),
            other => error_resp(status, code, Some(other.to_string())),
        }
    }
}

pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        AppError::AccountInactive | AppError::EmailUnverified | AppError::Forbidden => {
            StatusCode::FORBIDDEN
        }
        AppError::TokenInvalidOrExpired
        | AppError::ResetRequestFailed
        | AppError::Configuration(_)
        | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AppError::VerificationExpired => StatusCode::GONE,
        AppError::NotFound => StatusCode::NOT_FOUND,
    }
}

pub fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
