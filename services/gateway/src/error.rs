//! HTTP-facing error mapping.
//!
//! Authentication failures (missing, malformed, tampered or expired
//! tokens) all collapse to one generic 401 body, and every
//! authorization failure to one generic 403, so responses cannot be
//! used as an oracle for token state, role sets or resource ownership.
//! The distinct causes still reach the audit trail.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use common::api::error_response;
use errors::{EntregaError, ErrorInfo};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub EntregaError);

impl From<EntregaError> for ApiError {
    fn from(err: EntregaError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            EntregaError::Unauthorized(_)
            | EntregaError::TokenExpired
            | EntregaError::InvalidToken(_) => error_response(
                StatusCode::UNAUTHORIZED,
                ErrorInfo::new("UNAUTHORIZED", "authentication required"),
            ),

            EntregaError::Forbidden(_) => error_response(
                StatusCode::FORBIDDEN,
                ErrorInfo::new("FORBIDDEN", "access denied"),
            ),

            EntregaError::RateLimited { retry_after_secs } => {
                let mut response = error_response(
                    StatusCode::TOO_MANY_REQUESTS,
                    ErrorInfo::new("RATE_LIMIT_EXCEEDED", "too many requests"),
                );
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            },

            err => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    // Log the real cause; the response stays generic.
                    tracing::error!(error = %err, code = err.error_code(), "request failed");
                    error_response(status, ErrorInfo::new("INTERNAL_ERROR", "internal error"))
                } else {
                    error_response(status, err.to_error_info())
                }
            },
        }
    }
}
