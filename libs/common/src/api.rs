//! Shared API response envelope
//!
//! Every endpoint, success or failure, answers with the same JSON shape:
//! `{success, data?, error?, timestamp}`. Error payloads reuse
//! [`errors::ErrorInfo`] so machine-readable codes stay consistent.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use errors::ErrorInfo;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timestamp: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(info: ErrorInfo) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(info),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    Json(ApiResponse::success(data))
}

pub fn error_response(status: StatusCode, info: ErrorInfo) -> Response {
    (status, Json(ApiResponse::<()>::error(info))).into_response()
}
