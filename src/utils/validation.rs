//! Validation Utilities
//!
//! Field validators used by the auth request models and the helper that turns
//! a `ValidationErrors` set into a single field-scoped message.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use validator::{Validate, ValidationError, ValidationErrors};

use super::security::CONFIRMATION_CODE_LEN;

/// Validates email address format
pub fn validate_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    regex.is_match(email)
}

/// Normalizes email address to lowercase and removes whitespace
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Domain part of an email address, if it has one
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// Confirmation codes are fixed-width strings of ASCII digits
pub fn validate_confirmation_code(code: &str) -> bool {
    code.len() == CONFIRMATION_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

fn error_with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Custom validator rejecting any whitespace character
pub fn no_whitespace_validator(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_whitespace) {
        Err(error_with_message("whitespace", messages::NO_WHITESPACE))
    } else {
        Ok(())
    }
}

/// Custom validator for email fields using the validator crate
pub fn email_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(error_with_message("invalid_email", messages::INVALID_EMAIL))
    }
}

/// Custom validator for signup confirmation codes
pub fn confirmation_code_validator(code: &str) -> Result<(), ValidationError> {
    if validate_confirmation_code(code) {
        Ok(())
    } else {
        Err(error_with_message("invalid_code", messages::INVALID_CODE))
    }
}

/// Validate `value` and report the first failure as `"field: message"`,
/// checking fields in the given order.
pub fn validate_in_order<T: Validate>(value: &T, field_order: &[&str]) -> Result<(), String> {
    match value.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(first_field_error(&errors, field_order)
            .unwrap_or_else(|| "request: invalid input".to_string())),
    }
}

/// First error among `field_order`, formatted as `"field: message"`
pub fn first_field_error(errors: &ValidationErrors, field_order: &[&str]) -> Option<String> {
    let field_errors = errors.field_errors();

    field_order.iter().find_map(|field| {
        field_errors
            .iter()
            .find(|(name, _)| **name == *field)
            .and_then(|(_, errs)| errs.first())
            .map(|error| {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                format!("{}: {}", field, message)
            })
    })
}

/// Validation error messages for user-friendly responses
pub mod messages {
    pub const INVALID_EMAIL: &str = "must be a valid email address";
    pub const UNKNOWN_EMAIL_DOMAIN: &str = "email domain does not exist";
    pub const NO_WHITESPACE: &str = "must not contain whitespace";
    pub const INVALID_CODE: &str = "must be a 6-digit code";
}
