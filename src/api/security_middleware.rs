//! Security Middleware
//!
//! Response hardening headers and per-request access logging.

use std::time::Duration;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Span;

use crate::utils::security::SecurityHeaders;

/// Middleware to add security headers to all responses
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    for (name, value) in SecurityHeaders::standard() {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    response
}

/// Span for `TraceLayer`, carrying the method and path of the request
pub fn make_request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path()
    )
}

/// `TraceLayer` request hook
pub fn log_request(request: &Request, _span: &Span) {
    log::info!("{} {}", request.method(), request.uri().path());
}

/// `TraceLayer` response hook; server errors are logged as warnings
pub fn log_response(response: &Response, latency: Duration, _span: &Span) {
    let status = response.status().as_u16();
    let elapsed_ms = latency.as_millis();
    if response.status().is_server_error() {
        log::warn!("-> {} ({}ms)", status, elapsed_ms);
    } else {
        log::info!("-> {} ({}ms)", status, elapsed_ms);
    }
}
