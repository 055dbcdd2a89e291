//! Request and Response Models
//!
//! Data structures for API request and response payloads with validation.
//! Missing fields deserialize as empty strings so they surface as field-scoped
//! validation errors rather than body parse failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::validation::{
    confirmation_code_validator, email_validator, messages, no_whitespace_validator,
    normalize_email, validate_in_order,
};

/// Field check order for signup payloads
const SIGNUP_FIELDS: &[&str] = &["nickname", "email", "password"];

/// Field check order for signup confirmation payloads
const CONFIRM_FIELDS: &[&str] = &["nickname", "email", "password", "code"];

const LOGIN_FIELDS: &[&str] = &["login", "password"];

/// Request payload for starting a signup
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignupRequest {
    /// 5-32 characters, no whitespace
    #[validate(length(min = 5, max = 32, message = "must be between 5 and 32 characters"))]
    #[validate(custom(function = "no_whitespace_validator"))]
    pub nickname: String,

    /// 6-64 characters, well-formed address
    #[validate(length(min = 6, max = 64, message = "must be between 6 and 64 characters"))]
    #[validate(custom(function = "email_validator"))]
    pub email: String,

    /// 6-64 characters, no whitespace
    #[validate(length(min = 6, max = 64, message = "must be between 6 and 64 characters"))]
    #[validate(custom(function = "no_whitespace_validator"))]
    pub password: String,
}

impl SignupRequest {
    /// Trim every field and lowercase the email
    pub fn normalized(self) -> Self {
        Self {
            nickname: self.nickname.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password.trim().to_string(),
        }
    }

    pub fn check(&self) -> Result<(), String> {
        validate_in_order(self, SIGNUP_FIELDS)
    }
}

/// Request payload for confirming a signup with the emailed code
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ConfirmSignupRequest {
    #[validate(length(min = 5, max = 32, message = "must be between 5 and 32 characters"))]
    #[validate(custom(function = "no_whitespace_validator"))]
    pub nickname: String,

    #[validate(length(min = 6, max = 64, message = "must be between 6 and 64 characters"))]
    #[validate(custom(function = "email_validator"))]
    pub email: String,

    #[validate(length(min = 6, max = 64, message = "must be between 6 and 64 characters"))]
    #[validate(custom(function = "no_whitespace_validator"))]
    pub password: String,

    /// Exactly 6 ASCII digits
    #[validate(custom(function = "confirmation_code_validator"))]
    pub code: String,
}

impl ConfirmSignupRequest {
    pub fn normalized(self) -> Self {
        Self {
            nickname: self.nickname.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password.trim().to_string(),
            code: self.code.trim().to_string(),
        }
    }

    pub fn check(&self) -> Result<(), String> {
        validate_in_order(self, CONFIRM_FIELDS)
    }
}

/// Request payload for password login; `login` is a nickname or an email
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 5, max = 64, message = "must be between 5 and 64 characters"))]
    #[validate(custom(function = "no_whitespace_validator"))]
    pub login: String,

    #[validate(length(min = 6, max = 64, message = "must be between 6 and 64 characters"))]
    #[validate(custom(function = "no_whitespace_validator"))]
    pub password: String,
}

impl LoginRequest {
    /// Trim both fields; an email-shaped login is lowercased
    pub fn normalized(self) -> Self {
        let login = if self.login.contains('@') {
            normalize_email(&self.login)
        } else {
            self.login.trim().to_string()
        };

        Self {
            login,
            password: self.password.trim().to_string(),
        }
    }

    pub fn check(&self) -> Result<(), String> {
        validate_in_order(self, LOGIN_FIELDS)
    }
}

/// Generic acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgement {
    pub success: bool,
}

impl Acknowledgement {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Response for health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
