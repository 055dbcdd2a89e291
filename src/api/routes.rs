//! API Route Definitions
//!
//! This module defines the HTTP routes and the middleware stack around them.
//! The RouterBuilder allows selective enabling/disabling of API endpoints for
//! different deployment scenarios; [`create_app`] wraps the routes in the
//! admission pipeline.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::Layer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    normalize_path::NormalizePathLayer,
    trace::TraceLayer,
    CompressionLevel,
};

use super::{
    admission::{admission_gate, handle_panic, AdmissionState},
    handlers::*,
    security_middleware::{
        log_request, log_response, make_request_span, security_headers_middleware,
    },
};
use crate::config::AdmissionConfig;

/// gzip level applied to response bodies
const COMPRESSION_LEVEL: i32 = 5;

/// Builder for creating API routes with configurable endpoints
#[derive(Default)]
pub struct RouterBuilder {
    /// GET /health
    health_check: bool,
    /// POST /auth/signup
    signup: bool,
    /// POST /auth/signup-with-token
    signup_with_token: bool,
    /// POST /auth/login
    login: bool,
    /// POST /auth/login-with-token
    login_with_token: bool,
    /// POST /auth/logout
    logout: bool,
    /// POST /auth/validate-token
    validate_token: bool,
    /// POST /auth/recover-password
    recover_password: bool,
}

impl RouterBuilder {
    /// Creates a new router builder with all routes disabled by default
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router builder with all routes enabled
    pub fn with_all_routes() -> Self {
        Self {
            health_check: true,
            signup: true,
            signup_with_token: true,
            login: true,
            login_with_token: true,
            logout: true,
            validate_token: true,
            recover_password: true,
        }
    }

    /// Creates a router with minimal routes for monitoring
    pub fn with_minimal_routes() -> Self {
        Self::new().health_check(true)
    }

    /// Enables or disables the health check endpoint (GET /health)
    pub fn health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    /// Enables or disables the signup endpoint (POST /auth/signup)
    pub fn signup(mut self, enabled: bool) -> Self {
        self.signup = enabled;
        self
    }

    /// Enables or disables signup confirmation (POST /auth/signup-with-token)
    pub fn signup_with_token(mut self, enabled: bool) -> Self {
        self.signup_with_token = enabled;
        self
    }

    pub fn login(mut self, enabled: bool) -> Self {
        self.login = enabled;
        self
    }

    pub fn login_with_token(mut self, enabled: bool) -> Self {
        self.login_with_token = enabled;
        self
    }

    pub fn logout(mut self, enabled: bool) -> Self {
        self.logout = enabled;
        self
    }

    /// Enables or disables the token validation endpoint (POST /auth/validate-token)
    ///
    /// Lets other services check a bearer token without calling login.
    pub fn validate_token(mut self, enabled: bool) -> Self {
        self.validate_token = enabled;
        self
    }

    pub fn recover_password(mut self, enabled: bool) -> Self {
        self.recover_password = enabled;
        self
    }

    /// Builds the Axum router with the configured routes
    ///
    /// Every route answers other methods with a JSON 405, and unmatched paths
    /// get a JSON 404.
    pub fn build(self) -> Router<AppState> {
        let mut router = Router::new();

        if self.health_check {
            router = router.route("/health", get(health_check).fallback(method_not_allowed));
        }

        if self.signup {
            router = router.route("/auth/signup", post(signup).fallback(method_not_allowed));
        }

        if self.signup_with_token {
            router = router.route(
                "/auth/signup-with-token",
                post(signup_with_token).fallback(method_not_allowed),
            );
        }

        if self.login {
            router = router.route("/auth/login", post(login).fallback(method_not_allowed));
        }

        if self.login_with_token {
            router = router.route(
                "/auth/login-with-token",
                post(login_with_token).fallback(method_not_allowed),
            );
        }

        if self.logout {
            router = router.route("/auth/logout", post(logout).fallback(method_not_allowed));
        }

        if self.validate_token {
            router = router.route(
                "/auth/validate-token",
                post(validate_token).fallback(method_not_allowed),
            );
        }

        if self.recover_password {
            router = router.route(
                "/auth/recover-password",
                post(recover_password).fallback(method_not_allowed),
            );
        }

        router.fallback(not_found)
    }
}

/// Creates all API routes
pub fn create_routes() -> Router<AppState> {
    RouterBuilder::with_all_routes().build()
}

fn cors_layer(config: &AdmissionConfig) -> CorsLayer {
    let origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(config.allowed_methods.clone())
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Wrap `routes` in the full middleware stack, outermost first: request
/// tracing, security headers, response compression, panic recovery, path
/// normalization, the admission gates, the body limits and CORS.
pub fn create_app(routes: Router<AppState>, state: AppState, admission: AdmissionState) -> Router {
    let config = admission.config.clone();

    let gated = routes
        .layer(cors_layer(&config))
        .layer(DefaultBodyLimit::max(config.max_request_size))
        .layer(RequestBodyLimitLayer::new(config.max_request_size))
        .layer(from_fn_with_state(admission, admission_gate))
        .with_state(state);

    // Trailing slashes must be trimmed before the inner router matches.
    let normalized = NormalizePathLayer::trim_trailing_slash().layer(gated);

    Router::new()
        .fallback_service(normalized)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CompressionLayer::new().quality(CompressionLevel::Precise(COMPRESSION_LEVEL)))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_request(log_request)
                .on_response(log_response),
        )
}
