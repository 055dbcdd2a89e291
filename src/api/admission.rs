//! Admission Gates
//!
//! Request guardrails checked before any handler runs. Each gate looks at the
//! request and the fixed [`AdmissionConfig`] and either passes or returns the
//! terminal [`AppError`]. The rate limiter is the only shared state touched.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method, Uri, Version},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AdmissionConfig;
use crate::service::rate_limit_service::{RateLimitError, RateLimitService};
use crate::utils::error::AppError;

/// Shared state for the admission middleware
#[derive(Clone)]
pub struct AdmissionState {
    pub config: Arc<AdmissionConfig>,
    pub limiter: Arc<RateLimitService>,
}

impl AdmissionState {
    pub fn new(config: AdmissionConfig) -> Self {
        let limiter = Arc::new(RateLimitService::new(config.rate_limit));
        Self {
            config: Arc::new(config),
            limiter,
        }
    }
}

pub fn check_availability(config: &AdmissionConfig) -> Result<(), AppError> {
    if config.unavailable {
        return Err(AppError::Unavailable);
    }
    Ok(())
}

/// Path only; the query string is not counted
pub fn check_uri_length(uri: &Uri, config: &AdmissionConfig) -> Result<(), AppError> {
    if uri.path().len() > config.max_uri_length {
        return Err(AppError::UriTooLong);
    }
    Ok(())
}

/// Larger of the declared `Content-Length` and the body's known minimum size.
/// Bodies of unknown length are capped by `RequestBodyLimitLayer` as they are
/// read.
pub fn check_body_size(request: &Request, config: &AdmissionConfig) -> Result<(), AppError> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let buffered = request.body().size_hint().lower();

    if declared.max(buffered) > config.max_request_size as u64 {
        return Err(AppError::PayloadTooLarge);
    }
    Ok(())
}

pub fn check_rate_limit(limiter: &RateLimitService, client: &str) -> Result<(), AppError> {
    limiter.check(client).map_err(|err| match err {
        RateLimitError::RateLimitExceeded {
            identifier,
            attempts,
            retry_after,
        } => {
            log::warn!(
                "Rate limit exceeded for {} after {} requests",
                identifier,
                attempts
            );
            AppError::RateLimited {
                retry_after_secs: retry_after,
            }
        }
    })
}

/// Only a declared media type is checked; parameters such as charset are ignored
pub fn check_content_type(headers: &HeaderMap, config: &AdmissionConfig) -> Result<(), AppError> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };

    let media_type = value
        .to_str()
        .map(|raw| {
            raw.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .map_err(|_| AppError::UnsupportedMediaType("<non-ascii>".to_string()))?;

    if config.allowed_content_types.iter().any(|t| *t == media_type) {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType(media_type))
    }
}

/// Methods outside the global allow-list are not implemented at all; per-route
/// 405s are produced by the router itself.
pub fn check_method(method: &Method, config: &AdmissionConfig) -> Result<(), AppError> {
    if config.allowed_methods.contains(method) {
        Ok(())
    } else {
        Err(AppError::NotImplemented(format!("Method {}", method)))
    }
}

pub fn check_version(version: Version, config: &AdmissionConfig) -> Result<(), AppError> {
    if config.supported_versions.contains(&version) {
        Ok(())
    } else {
        Err(AppError::HttpVersionNotSupported)
    }
}

/// Rate-limit key for the request: proxy headers when trusted, otherwise the
/// peer address.
pub fn client_key(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let headers = request.headers();
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded.or(real_ip) {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn admit(request: &Request, state: &AdmissionState) -> Result<(), AppError> {
    let config = state.config.as_ref();

    check_availability(config)?;
    check_uri_length(request.uri(), config)?;
    check_body_size(request, config)?;
    check_rate_limit(
        &state.limiter,
        &client_key(request, config.trust_proxy_headers),
    )?;
    check_content_type(request.headers(), config)?;
    check_method(request.method(), config)
}

/// Run the gates in order, then the rest of the stack under the request
/// deadline. Dropping the inner future on timeout drops any open transaction.
pub async fn admission_gate(
    State(state): State<AdmissionState>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(err) = admit(&request, &state) {
        return err.into_response();
    }

    let config = state.config.clone();
    let handled = async move {
        check_version(request.version(), &config)?;
        Ok::<_, AppError>(next.run(request).await)
    };

    match tokio::time::timeout(state.config.request_timeout, handled).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => err.into_response(),
        Err(_) => AppError::Timeout.into_response(),
    }
}

/// Panic handler for `CatchPanicLayer`
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    AppError::Internal(format!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::rate_limit_service::RateLimit;
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    fn config() -> AdmissionConfig {
        AdmissionConfig {
            max_uri_length: 32,
            max_request_size: 1024,
            rate_limit: RateLimit::new(3, Duration::from_secs(10)),
            request_timeout: Duration::from_secs(5),
            ..AdmissionConfig::default()
        }
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), value.parse().unwrap());
        }
        map
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(60)).await;
        "done"
    }

    fn app(config: AdmissionConfig) -> Router {
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/slow", get(slow))
            .layer(from_fn_with_state(
                AdmissionState::new(config),
                admission_gate,
            ))
    }

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn sized_request(content_length: Option<&str>, body: Body) -> Request {
        let mut builder = Request::builder().method(Method::POST).uri("/ok");
        if let Some(length) = content_length {
            builder = builder.header(header::CONTENT_LENGTH, length);
        }
        builder.body(body).unwrap()
    }

    #[test]
    fn test_uri_length_counts_path_only() {
        let config = config();
        assert!(check_uri_length(&"/ok".parse().unwrap(), &config).is_ok());

        let long_query: Uri = format!("/ok?q={}", "a".repeat(40)).parse().unwrap();
        assert!(check_uri_length(&long_query, &config).is_ok());

        let long_path: Uri = format!("/{}", "a".repeat(40)).parse().unwrap();
        assert!(matches!(
            check_uri_length(&long_path, &config),
            Err(AppError::UriTooLong)
        ));
    }

    #[test]
    fn test_declared_body_size() {
        let config = config();
        assert!(check_body_size(&sized_request(Some("1024"), Body::empty()), &config).is_ok());
        assert!(matches!(
            check_body_size(&sized_request(Some("1025"), Body::empty()), &config),
            Err(AppError::PayloadTooLarge)
        ));
        assert!(check_body_size(&sized_request(None, Body::empty()), &config).is_ok());
    }

    #[test]
    fn test_actual_body_size_without_declared_length() {
        let config = config();
        assert!(check_body_size(&sized_request(None, Body::from(vec![b'a'; 1024])), &config).is_ok());
        assert!(matches!(
            check_body_size(&sized_request(None, Body::from(vec![b'a'; 1025])), &config),
            Err(AppError::PayloadTooLarge)
        ));
        // an understated length does not hide the real size
        assert!(matches!(
            check_body_size(&sized_request(Some("10"), Body::from(vec![b'a'; 2048])), &config),
            Err(AppError::PayloadTooLarge)
        ));
    }

    #[test]
    fn test_content_type_allow_list() {
        let config = config();
        assert!(check_content_type(&HeaderMap::new(), &config).is_ok());
        assert!(check_content_type(
            &headers(&[(header::CONTENT_TYPE, "Application/JSON; charset=utf-8")]),
            &config
        )
        .is_ok());
        assert!(matches!(
            check_content_type(&headers(&[(header::CONTENT_TYPE, "application/xml")]), &config),
            Err(AppError::UnsupportedMediaType(ref media)) if media == "application/xml"
        ));
    }

    #[test]
    fn test_method_and_version() {
        let config = config();
        assert!(check_method(&Method::POST, &config).is_ok());
        assert!(matches!(
            check_method(&Method::PATCH, &config),
            Err(AppError::NotImplemented(_))
        ));
        assert!(check_version(Version::HTTP_11, &config).is_ok());
        assert!(matches!(
            check_version(Version::HTTP_10, &config),
            Err(AppError::HttpVersionNotSupported)
        ));
    }

    #[test]
    fn test_client_key_sources() {
        let mut request = Request::builder()
            .uri("/ok")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));

        assert_eq!(client_key(&request, true), "203.0.113.9");
        assert_eq!(client_key(&request, false), "192.0.2.1");
        assert_eq!(client_key(&get_request("/ok"), false), "unknown");
    }

    #[tokio::test]
    async fn test_unavailable_shadows_everything() {
        let config = AdmissionConfig {
            unavailable: true,
            ..config()
        };
        let long = format!("/{}", "a".repeat(40));

        let response = app(config).oneshot(get_request(&long)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_uri_gate_runs_before_method_gate() {
        let long = format!("/{}", "a".repeat(40));
        let request = Request::builder()
            .method(Method::PATCH)
            .uri(long)
            .body(Body::empty())
            .unwrap();

        let response = app(config()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::URI_TOO_LONG);
    }

    #[tokio::test]
    async fn test_rate_limit_gate() {
        let app = app(config());

        for _ in 0..3 {
            let response = app.clone().oneshot(get_request("/ok")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(get_request("/ok")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_unsupported_version() {
        let request = Request::builder()
            .uri("/ok")
            .version(Version::HTTP_10)
            .body(Body::empty())
            .unwrap();

        let response = app(config()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::HTTP_VERSION_NOT_SUPPORTED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_times_out() {
        let response = app(config()).oneshot(get_request("/slow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
