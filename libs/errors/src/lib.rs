//! Unified error handling for Entrega services
//!
//! One workspace-wide error type that every service crate maps onto, so
//! HTTP status codes, machine-readable error codes and retry semantics
//! stay consistent across the API surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// ErrorInfo - API error response type
// ============================================================================

/// Standard error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: String,
    /// Error message
    pub message: String,
    /// Detailed error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific errors for validation
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_errors: HashMap<String, Vec<String>>,
}

impl ErrorInfo {
    /// Create a new ErrorInfo with a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            field_errors: HashMap::new(),
        }
    }

    /// Add details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Add a field error
    pub fn add_field_error(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(error.into());
        self
    }
}

// ============================================================================
// EntregaError - Main error type
// ============================================================================

/// Main error type for all Entrega services
#[derive(Debug, Error)]
pub enum EntregaError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Authentication & Authorization Errors
    // ======================================
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid parameter: {param}: {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid room key: {0}")]
    InvalidRoomKey(String),

    // ======================================
    // Order Errors
    // ======================================
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Version conflict on {resource}")]
    VersionConflict { resource: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conflict: {resource} already exists")]
    AlreadyExists { resource: String },

    // ======================================
    // Storage & Collaborator Errors
    // ======================================
    #[error("Store error: {0}")]
    Store(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Timeout waiting for {0}")]
    Timeout(String),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using EntregaError
pub type EntregaResult<T> = Result<T, EntregaError>;

impl EntregaError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 401 Unauthorized
            Self::Unauthorized(_) | Self::TokenExpired | Self::InvalidToken(_) => 401,

            // 403 Forbidden
            Self::Forbidden(_) => 403,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 409 Conflict
            Self::AlreadyExists { .. } | Self::VersionConflict { .. } => 409,

            // 422 Unprocessable Entity
            Self::Validation(_)
            | Self::InvalidParameter { .. }
            | Self::UnknownRole(_)
            | Self::InvalidRoomKey(_)
            | Self::InvalidTransition { .. } => 422,

            // 429 Too Many Requests
            Self::RateLimited { .. } => 429,

            // 504 Gateway Timeout
            Self::Timeout(_) => 504,

            // 500 Internal Server Error
            Self::Configuration(_)
            | Self::InvalidConfig { .. }
            | Self::Store(_)
            | Self::Notification(_)
            | Self::StartupFailed(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::Other(_) => 500,
        }
    }

    /// Machine-readable error code (for API, logs, monitoring)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",

            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",

            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::UnknownRole(_) => "UNKNOWN_ROLE",
            Self::InvalidRoomKey(_) => "INVALID_ROOM_KEY",

            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",

            Self::Store(_) => "STORE_ERROR",
            Self::Notification(_) => "NOTIFICATION_ERROR",
            Self::Timeout(_) => "TIMEOUT",

            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    /// Get error category (for classification/metrics)
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } => ErrorCategory::Configuration,

            Self::Unauthorized(_)
            | Self::TokenExpired
            | Self::InvalidToken(_)
            | Self::Forbidden(_) => ErrorCategory::Permission,

            Self::RateLimited { .. } => ErrorCategory::ResourceExhausted,

            Self::Validation(_)
            | Self::InvalidParameter { .. }
            | Self::UnknownRole(_)
            | Self::InvalidRoomKey(_) => ErrorCategory::Validation,

            Self::InvalidTransition { .. } | Self::VersionConflict { .. } => {
                ErrorCategory::Transition
            },

            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,

            Self::Store(_) => ErrorCategory::Storage,
            Self::Notification(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,

            Self::StartupFailed(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this error is retryable
    ///
    /// Applies to idempotent reads only; state-mutating writes are never
    /// retried by callers regardless of this flag.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Timeout | ErrorCategory::Network | ErrorCategory::Storage
        )
    }

    /// Convert to API ErrorInfo for HTTP responses
    pub fn to_error_info(&self) -> ErrorInfo {
        let mut error_info = ErrorInfo::new(self.error_code(), self.to_string());

        match self {
            Self::InvalidParameter { param, reason } => {
                error_info = error_info.add_field_error(param, reason);
            },
            Self::Validation(msg) => {
                error_info = error_info.with_details(msg.clone());
            },
            _ => {},
        }

        error_info
    }

    /// Get log level for this error
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Storage => Level::ERROR,
            ErrorCategory::Network | ErrorCategory::Timeout => Level::WARN,
            ErrorCategory::Validation
            | ErrorCategory::NotFound
            | ErrorCategory::Permission
            | ErrorCategory::Transition => Level::INFO,
            _ => Level::WARN,
        }
    }
}

impl From<serde_json::Error> for EntregaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// ============================================================================
// Error category - used for classification and metrics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Storage,
    Network,
    Timeout,

    // Business logic layer
    Validation,
    NotFound,
    Conflict,
    Permission,

    // Order lifecycle layer
    Transition,

    // System level
    Internal,
    ResourceExhausted,

    // Others
    Unknown,
}

#[cfg(feature = "axum-support")]
impl EntregaError {
    /// Convert to an axum HTTP status code
    pub fn http_status(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::EntregaError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::EntregaError::Validation(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::EntregaError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::EntregaError::Internal(format!($fmt, $($arg)*))
    };
}

// Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(EntregaError::Unauthorized("test".into()).status_code(), 401);
        assert_eq!(EntregaError::TokenExpired.status_code(), 401);
        assert_eq!(EntregaError::Forbidden("test".into()).status_code(), 403);
        assert_eq!(
            EntregaError::NotFound {
                resource: "order".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            EntregaError::VersionConflict {
                resource: "order".into()
            }
            .status_code(),
            409
        );
        assert_eq!(
            EntregaError::InvalidTransition {
                from: "delivered".into(),
                to: "accepted".into()
            }
            .status_code(),
            422
        );
        assert_eq!(
            EntregaError::RateLimited {
                retry_after_secs: 30
            }
            .status_code(),
            429
        );
        assert_eq!(EntregaError::Internal("test".into()).status_code(), 500);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(EntregaError::TokenExpired.error_code(), "TOKEN_EXPIRED");
        assert_eq!(
            EntregaError::InvalidToken("bad".into()).error_code(),
            "INVALID_TOKEN"
        );
        assert_eq!(
            EntregaError::RateLimited {
                retry_after_secs: 1
            }
            .error_code(),
            "RATE_LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(EntregaError::Timeout("store".into()).is_retryable());
        assert!(EntregaError::Store("down".into()).is_retryable());
        assert!(!EntregaError::Forbidden("test".into()).is_retryable());
        assert!(!EntregaError::InvalidTransition {
            from: "pending".into(),
            to: "delivered".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_info() {
        let error = EntregaError::InvalidParameter {
            param: "role".into(),
            reason: "unknown value".into(),
        };
        let info = error.to_error_info();
        assert_eq!(info.code, "INVALID_PARAMETER");
        assert!(info.field_errors.contains_key("role"));
    }
}
