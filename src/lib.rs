//! Account Service Library
//!
//! An HTTP account service: every request passes an ordered chain of
//! admission gates before reaching the auth handlers, which run a two-phase
//! email signup, password login and bearer token issuance against a
//! transactional account store.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use account_service::{
//!     api::{create_app, AdmissionState, AppState, RouterBuilder},
//!     config::{AdmissionConfig, HashingConfig, SignupConfig},
//!     database::MemoryStore,
//!     service::{AuthService, LogMailer, TokenIssuer},
//!     utils::CredentialHasher,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth_service = AuthService::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(LogMailer),
//!         CredentialHasher::new(HashingConfig::default()),
//!         TokenIssuer::new(
//!             "a-secret-of-at-least-thirty-two-bytes!",
//!             "account-service",
//!             "account-service-api",
//!             chrono::Duration::hours(24),
//!         ),
//!         SignupConfig::default(),
//!     )?;
//!
//!     let state = AppState {
//!         auth_service: Arc::new(auth_service),
//!     };
//!
//!     // Only enable the endpoints this deployment needs
//!     let routes = RouterBuilder::new()
//!         .health_check(true)
//!         .signup(true)
//!         .signup_with_token(true)
//!         .login(true)
//!         .build();
//!     let app = create_app(routes, state, AdmissionState::new(AdmissionConfig::default()));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **API Layer**: admission gates, handlers and configurable route definitions
//! - **Service Layer**: signup state machine, token issuer, mailer, rate limiter
//! - **Models**: accounts, credentials, pending registrations and payloads
//! - **Database**: store traits, PostgreSQL and in-memory stores, transaction executor
//! - **Utils**: credential hashing, validation and error handling

/// HTTP API layer with admission gates, handlers and configurable routing
pub mod api;

/// Configuration management for all service settings
pub mod config;

/// Account store implementations and the transaction executor
pub mod database;

/// Data models and request/response structures
pub mod models;

/// Signup, login and token services
pub mod service;

/// Shared utilities for security, validation, and error handling
pub mod utils;

// Re-export commonly used types for convenient access
pub use api::{create_app, create_routes, AdmissionState, AppState, RouterBuilder};
pub use models::{
    AuthPayload, ConfirmSignupRequest, LoginRequest, SignupRequest, TokenValidation, User,
};
pub use service::{AuthError, AuthService, RateLimitService, TokenIssuer};
pub use utils::error::{AppError, AppResult, ErrorResponse};

// Re-export database utilities for configuration
pub use database::{AccountStore, DatabaseConfig, DatabasePool, MemoryStore, PgStore};

// Re-export configuration system
pub use config::{env, AdmissionConfig, AppConfig, EmailConfig, JwtConfig, ServerConfig, SignupConfig};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
