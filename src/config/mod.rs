//! Configuration Module
//!
//! Centralized configuration for the account service. Everything is read from
//! the environment once at startup, validated, and then passed by value into
//! the services and the router.

pub mod security;

use std::time::Duration;

use thiserror::Error;

use crate::database::DatabaseConfig;

// Re-export configuration types for convenient access
pub use security::{AdmissionConfig, HashingConfig};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {value} - {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Environment variable helpers
pub mod env {
    use std::env;

    use super::ConfigError;

    /// Get environment variable as string with default
    pub fn get_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get environment variable as boolean with default
    pub fn get_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u32 with default
    pub fn get_u32(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u16 with default
    pub fn get_u16(key: &str, default: u16) -> u16 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u64 with default
    pub fn get_u64(key: &str, default: u64) -> u64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as usize with default
    pub fn get_usize(key: &str, default: usize) -> usize {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as i64 with default
    pub fn get_i64(key: &str, default: i64) -> i64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Comma-separated list with default, entries trimmed, empties dropped
    pub fn get_list(key: &str, default: &[&str]) -> Vec<String> {
        match env::var(key) {
            Ok(raw) => split_list(&raw),
            Err(_) => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn split_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get environment variable if set and non-empty
    pub fn get_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get required environment variable
    pub fn get_required(key: &str) -> Result<String, ConfigError> {
        get_optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }
}

/// Application configuration combining all service configurations
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration; `None` runs against the in-memory store
    pub database: Option<DatabaseConfig>,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Email configuration; `None` logs messages instead of sending them
    pub email: Option<EmailConfig>,

    /// Request admission guardrails
    pub admission: AdmissionConfig,

    /// Password hashing cost parameters
    pub hashing: HashingConfig,

    /// Signup lifecycle settings
    pub signup: SignupConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_hours: i64,
}

impl JwtConfig {
    /// One year
    pub const MAX_EXPIRES_HOURS: i64 = 24 * 365;
}

/// Email service configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_name: String,
    pub from_email: String,
}

/// Signup lifecycle settings
#[derive(Debug, Clone)]
pub struct SignupConfig {
    /// How long a pending registration stays confirmable
    pub pending_ttl: Duration,

    /// Product name used in outgoing mail
    pub app_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::get_string("SERVER_HOST", "0.0.0.0"),
            port: env::get_u16("SERVER_PORT", 3000),
            log_level: env::get_string("LOG_LEVEL", "info"),
        }
    }
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret: env::get_required("JWT_SECRET")?,
            issuer: env::get_string("JWT_ISSUER", "account-service"),
            audience: env::get_string("JWT_AUDIENCE", "account-service-api"),
            expires_hours: env::get_i64("JWT_EXPIRES_HOURS", 24),
        })
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = env::get_optional("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: env::get_u16("SMTP_PORT", 587),
            smtp_username: env::get_optional("SMTP_USERNAME"),
            smtp_password: env::get_optional("SMTP_PASSWORD"),
            from_name: env::get_string("SMTP_FROM_NAME", "Account Service"),
            from_email: env::get_required("SMTP_FROM_EMAIL")?,
        }))
    }
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::from_secs(60 * 60),
            app_name: "Account Service".to_string(),
        }
    }
}

impl SignupConfig {
    /// Thirty days
    pub const MAX_PENDING_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    pub fn from_env() -> Self {
        Self {
            pending_ttl: Duration::from_secs(pending_ttl_secs(env::get_u64(
                "PENDING_REGISTRATION_TTL_MINUTES",
                60,
            ))),
            app_name: env::get_string("APP_NAME", "Account Service"),
        }
    }
}

/// Out-of-range values saturate and are rejected by [`AppConfig::validate`]
fn pending_ttl_secs(minutes: u64) -> u64 {
    minutes.saturating_mul(60)
}

impl AppConfig {
    /// Load complete application configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env()?,
            email: EmailConfig::from_env()?,
            admission: AdmissionConfig::from_env()?,
            hashing: HashingConfig::from_env(),
            signup: SignupConfig::from_env(),
        })
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if let Some(database) = &self.database {
            if database.max_connections == 0 {
                return Err(ConfigError::ValidationError(
                    "Database max_connections must be greater than 0".to_string(),
                ));
            }

            if database.min_connections > database.max_connections {
                return Err(ConfigError::ValidationError(
                    "Database min_connections cannot be greater than max_connections".to_string(),
                ));
            }
        }

        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::ValidationError(
                "JWT secret must be at least 32 bytes".to_string(),
            ));
        }

        if self.jwt.expires_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "JWT expiry must be positive".to_string(),
            ));
        }

        if self.jwt.expires_hours > JwtConfig::MAX_EXPIRES_HOURS {
            return Err(ConfigError::InvalidValue {
                key: "JWT_EXPIRES_HOURS".to_string(),
                value: self.jwt.expires_hours.to_string(),
                reason: format!("must be at most {}", JwtConfig::MAX_EXPIRES_HOURS),
            });
        }

        if self.signup.pending_ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "Pending registration TTL must be positive".to_string(),
            ));
        }

        if self.signup.pending_ttl > SignupConfig::MAX_PENDING_TTL {
            return Err(ConfigError::InvalidValue {
                key: "PENDING_REGISTRATION_TTL_MINUTES".to_string(),
                value: (self.signup.pending_ttl.as_secs() / 60).to_string(),
                reason: format!(
                    "must be at most {}",
                    SignupConfig::MAX_PENDING_TTL.as_secs() / 60
                ),
            });
        }

        self.admission.validate()?;
        self.hashing.validate()?;

        Ok(())
    }
}
