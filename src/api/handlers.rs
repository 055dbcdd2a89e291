//! HTTP Request Handlers
//!
//! Axum handlers for the auth endpoints. Each one unpacks the request, calls
//! the auth service and maps its result onto a JSON response.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::middleware::BearerToken;
use crate::{
    models::{
        Acknowledgement, AuthPayload, ConfirmSignupRequest, HealthCheckResponse, LoginRequest,
        SignupRequest, TokenValidation,
    },
    service::AuthService,
    utils::error::{AppError, AppResult},
    VERSION,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
}

/// JSON body extractor whose rejections use the service's error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Start a signup and mail the confirmation code
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> AppResult<Json<Acknowledgement>> {
    let ack = state.auth_service.begin_signup(request).await?;
    Ok(Json(ack))
}

/// Confirm a signup with the mailed code and create the account
pub async fn signup_with_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ConfirmSignupRequest>,
) -> AppResult<(StatusCode, Json<AuthPayload>)> {
    let payload = state.auth_service.confirm_signup(request).await?;
    Ok((StatusCode::CREATED, Json(payload)))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthPayload>> {
    let payload = state.auth_service.login(request).await?;
    Ok(Json(payload))
}

pub async fn login_with_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<AuthPayload>> {
    let payload = state.auth_service.login_with_token(&token).await?;
    Ok(Json(payload))
}

pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Acknowledgement>> {
    let ack = state.auth_service.logout(&token).await?;
    Ok(Json(ack))
}

pub async fn validate_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<TokenValidation>> {
    let validation = state.auth_service.validate_token(&token)?;
    Ok(Json(validation))
}

pub async fn recover_password(State(state): State<AppState>) -> AppResult<Json<Acknowledgement>> {
    let ack = state.auth_service.recover_password().await?;
    Ok(Json(ack))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthCheckResponse>> {
    if !state.auth_service.store_healthy().await {
        return Err(AppError::Unavailable);
    }

    Ok(Json(HealthCheckResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: VERSION.to_string(),
    }))
}

/// Route-level fallback for methods the matched path does not serve
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Router fallback for unmatched paths
pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
