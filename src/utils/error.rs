//! Error Handling Utilities
//!
//! Error taxonomy shared by the admission pipeline and the auth handlers, and
//! its mapping onto HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type. Every terminal response in the service is
/// produced from one of these variants.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Field-scoped validation errors for user input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad credentials or bad bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict errors (nickname or email already taken)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Too many requests from one client inside the rate-limit window
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("URI too long")]
    UriTooLong,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Method is known but not allowed on the matched route
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Method (or operation) is not implemented by this service
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service unavailable")]
    Unavailable,

    #[error("HTTP version not supported")]
    HttpVersionNotSupported,

    /// Generic internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Standard error response structure for API endpoints
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

impl AppError {
    /// HTTP status, stable machine-readable kind and client-facing message.
    ///
    /// Internal variants replace their message so store or configuration text
    /// never reaches the client.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "Too many requests. Please try again later.".to_string(),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "Request body exceeds the allowed size".to_string(),
            ),
            AppError::UriTooLong => (
                StatusCode::URI_TOO_LONG,
                "URI_TOO_LONG",
                "Request URI exceeds the allowed length".to_string(),
            ),
            AppError::UnsupportedMediaType(media) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                format!("Content type '{}' is not supported", media),
            ),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                "Method not allowed for this route".to_string(),
            ),
            AppError::NotImplemented(what) => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_IMPLEMENTED",
                format!("{} is not implemented", what),
            ),
            AppError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "The request took too long to process".to_string(),
            ),
            AppError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "The service is temporarily unavailable".to_string(),
            ),
            AppError::HttpVersionNotSupported => (
                StatusCode::HTTP_VERSION_NOT_SUPPORTED,
                "HTTP_VERSION_NOT_SUPPORTED",
                "HTTP version not supported".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
            ),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                "Server configuration error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        if status.is_server_error() {
            log::error!("{} {}: {}", status.as_u16(), error_code, self);
        }

        let error_response = ErrorResponse::new(error_code, &message);
        let mut response = (status, Json(error_response)).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge,
            StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                AppError::UnsupportedMediaType("expected application/json".to_string())
            }
            _ => AppError::Validation(rejection.body_text()),
        }
    }
}

/// Result type alias for operations that can return AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.error, "TEST_ERROR");
        assert_eq!(error.message, "Test message");
    }

    #[test]
    fn test_app_error_display() {
        let error = AppError::Validation("email: must be a valid email address".to_string());
        assert_eq!(
            error.to_string(),
            "Validation error: email: must be a valid email address"
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::UriTooLong, StatusCode::URI_TOO_LONG),
            (AppError::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED),
            (AppError::NotImplemented("x".into()), StatusCode::NOT_IMPLEMENTED),
            (AppError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (AppError::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                AppError::HttpVersionNotSupported,
                StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let error = AppError::Internal("connection refused to 10.0.0.7".to_string());
        let (_, kind, message) = error.parts();
        assert_eq!(kind, "INTERNAL_ERROR");
        assert!(!message.contains("10.0.0.7"));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited {
            retry_after_secs: 7,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "7");
    }
}
