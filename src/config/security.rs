//! Security Configuration
//!
//! Request admission guardrails and password hashing cost parameters.

use std::time::Duration;

use axum::http::{Method, Version};

use super::{env, ConfigError};
use crate::service::rate_limit_service::RateLimit;

pub const DEFAULT_MAX_URI_LENGTH: usize = 1024;
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 12 * 1024 * 1024;
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 15;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &["application/json", "text/plain"];
pub const DEFAULT_ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "OPTIONS"];
pub const DEFAULT_SUPPORTED_HTTP_VERSIONS: &[&str] = &["HTTP/1.1", "HTTP/2.0"];

/// Guardrails applied to every request before it reaches a handler
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Reject everything with 503 while set
    pub unavailable: bool,

    /// Maximum path length, in characters; the query string is not counted
    pub max_uri_length: usize,

    /// Maximum request body size in bytes
    pub max_request_size: usize,

    /// Per-client fixed window
    pub rate_limit: RateLimit,

    pub request_timeout: Duration,

    /// Lowercase media types without parameters
    pub allowed_content_types: Vec<String>,

    pub allowed_methods: Vec<Method>,

    pub supported_versions: Vec<Version>,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Take the client address from X-Real-IP / X-Forwarded-For
    pub trust_proxy_headers: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            unavailable: false,
            max_uri_length: DEFAULT_MAX_URI_LENGTH,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            rate_limit: RateLimit::new(
                DEFAULT_RATE_LIMIT_REQUESTS,
                Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
            ),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            supported_versions: vec![Version::HTTP_11, Version::HTTP_2],
            cors_origins: vec!["*".to_string()],
            trust_proxy_headers: false,
        }
    }
}

impl AdmissionConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let allowed_methods = env::get_list("ALLOWED_METHODS", DEFAULT_ALLOWED_METHODS)
            .iter()
            .map(|raw| parse_method("ALLOWED_METHODS", raw))
            .collect::<Result<Vec<_>, _>>()?;

        let supported_versions =
            env::get_list("SUPPORTED_HTTP_VERSIONS", DEFAULT_SUPPORTED_HTTP_VERSIONS)
                .iter()
                .map(|raw| parse_http_version("SUPPORTED_HTTP_VERSIONS", raw))
                .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            unavailable: env::get_bool("SERVICE_UNAVAILABLE", false),
            max_uri_length: env::get_usize("MAX_URI_LENGTH", DEFAULT_MAX_URI_LENGTH),
            max_request_size: env::get_usize("MAX_REQUEST_SIZE", DEFAULT_MAX_REQUEST_SIZE),
            rate_limit: RateLimit::new(
                env::get_u32("RATE_LIMIT_REQUESTS", DEFAULT_RATE_LIMIT_REQUESTS),
                Duration::from_secs(env::get_u64(
                    "RATE_LIMIT_WINDOW_SECONDS",
                    DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
                )),
            ),
            request_timeout: Duration::from_secs(env::get_u64(
                "REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )),
            allowed_content_types: env::get_list(
                "ALLOWED_CONTENT_TYPES",
                DEFAULT_ALLOWED_CONTENT_TYPES,
            )
            .into_iter()
            .map(|s| s.to_ascii_lowercase())
            .collect(),
            allowed_methods,
            supported_versions,
            cors_origins: env::get_list("CORS_ORIGINS", &["*"]),
            trust_proxy_headers: env::get_bool("TRUST_PROXY_HEADERS", false),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_uri_length == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_URI_LENGTH must be greater than 0".to_string(),
            ));
        }

        if self.max_request_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_REQUEST_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window.is_zero() {
            return Err(ConfigError::ValidationError(
                "Rate limit requests and window must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "REQUEST_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.allowed_methods.is_empty() || self.supported_versions.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one method and one HTTP version must be allowed".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_method(key: &str, raw: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|e| {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Parse `HTTP/1.1`-style version labels
pub fn parse_http_version(key: &str, raw: &str) -> Result<Version, ConfigError> {
    match raw.to_ascii_uppercase().as_str() {
        "HTTP/0.9" => Ok(Version::HTTP_09),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/2" | "HTTP/2.0" => Ok(Version::HTTP_2),
        "HTTP/3" | "HTTP/3.0" => Ok(Version::HTTP_3),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "unknown HTTP version".to_string(),
        }),
    }
}

/// Argon2id cost parameters, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub output_len: usize,
    pub salt_len: usize,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 1,
            parallelism: 4,
            output_len: 32,
            salt_len: 16,
        }
    }
}

impl HashingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memory_kib: env::get_u32("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: env::get_u32("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: env::get_u32("ARGON2_PARALLELISM", defaults.parallelism),
            output_len: env::get_usize("ARGON2_OUTPUT_LEN", defaults.output_len),
            salt_len: env::get_usize("ARGON2_SALT_LEN", defaults.salt_len),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        argon2::Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| ConfigError::ValidationError(format!("Invalid Argon2 parameters: {}", e)))?;

        if self.salt_len < argon2::RECOMMENDED_SALT_LEN {
            return Err(ConfigError::ValidationError(format!(
                "ARGON2_SALT_LEN must be at least {}",
                argon2::RECOMMENDED_SALT_LEN
            )));
        }

        Ok(())
    }

    /// Cheap parameters so unit tests do not spend seconds hashing
    #[cfg(test)]
    pub fn fast_for_tests() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            output_len: 32,
            salt_len: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_defaults() {
        let config = AdmissionConfig::default();
        assert_eq!(config.max_uri_length, 1024);
        assert_eq!(config.max_request_size, 12 * 1024 * 1024);
        assert_eq!(config.rate_limit.max_requests, 15);
        assert_eq!(config.rate_limit.window, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.allowed_methods.contains(&Method::OPTIONS));
        assert!(!config.allowed_methods.contains(&Method::PATCH));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_http_version() {
        assert_eq!(parse_http_version("K", "HTTP/1.1").unwrap(), Version::HTTP_11);
        assert_eq!(parse_http_version("K", "http/2.0").unwrap(), Version::HTTP_2);
        assert!(matches!(
            parse_http_version("K", "HTTP/4"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_hashing_validation() {
        assert!(HashingConfig::default().validate().is_ok());

        let bad = HashingConfig {
            salt_len: 4,
            ..HashingConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
