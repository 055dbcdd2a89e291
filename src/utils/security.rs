//! Security Utilities
//!
//! Password hashing, confirmation codes and constant-time comparison.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::prelude::*;
use rand::{rngs::OsRng, Rng, RngCore};
use thiserror::Error;

use crate::config::HashingConfig;

/// Number of digits in a signup confirmation code
pub const CONFIRMATION_CODE_LEN: usize = 6;

/// Errors produced by the credential hasher
#[derive(Error, Debug)]
pub enum HashError {
    /// The supplied password does not match the stored hash
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The stored salt or hash is not valid base64
    #[error("Stored credential is malformed: {0}")]
    Malformed(String),

    /// Argon2 rejected the parameters or the input
    #[error("Password hashing failed: {0}")]
    Argon2(String),
}

/// A password hash together with the salt it was derived with, both base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

/// Argon2id key derivation with fixed, configuration-provided cost parameters.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    config: HashingConfig,
}

impl CredentialHasher {
    pub fn new(config: HashingConfig) -> Self {
        Self { config }
    }

    /// Hash `password`. When `salt` is `None` a fresh random salt is drawn from
    /// the OS generator, so two calls never share a salt.
    pub fn hash(&self, password: &str, salt: Option<&str>) -> Result<HashedPassword, HashError> {
        let salt_bytes = match salt {
            Some(encoded) => BASE64_STANDARD
                .decode(encoded)
                .map_err(|e| HashError::Malformed(e.to_string()))?,
            None => self.generate_salt(),
        };

        let hash = self.derive(password, &salt_bytes)?;

        Ok(HashedPassword {
            hash: BASE64_STANDARD.encode(hash),
            salt: BASE64_STANDARD.encode(salt_bytes),
        })
    }

    /// Recompute the hash with the stored salt and compare in constant time.
    pub fn verify(&self, password: &str, stored: &HashedPassword) -> Result<(), HashError> {
        let salt_bytes = BASE64_STANDARD
            .decode(&stored.salt)
            .map_err(|e| HashError::Malformed(e.to_string()))?;
        let expected = BASE64_STANDARD
            .decode(&stored.hash)
            .map_err(|e| HashError::Malformed(e.to_string()))?;

        let actual = self.derive(password, &salt_bytes)?;

        if constant_time_compare(&actual, &expected) {
            Ok(())
        } else {
            Err(HashError::InvalidCredentials)
        }
    }

    fn derive(&self, password: &str, salt: &[u8]) -> Result<Vec<u8>, HashError> {
        let params = Params::new(
            self.config.memory_kib,
            self.config.iterations,
            self.config.parallelism,
            Some(self.config.output_len),
        )
        .map_err(|e| HashError::Argon2(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut output = vec![0u8; self.config.output_len];
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut output)
            .map_err(|e| HashError::Argon2(e.to_string()))?;

        Ok(output)
    }

    fn generate_salt(&self) -> Vec<u8> {
        let mut salt = vec![0u8; self.config.salt_len];
        OsRng.fill_bytes(&mut salt);
        salt
    }
}

/// Generate a zero-padded numeric confirmation code, e.g. `"048213"`.
pub fn generate_confirmation_code() -> String {
    let upper = 10u32.pow(CONFIRMATION_CODE_LEN as u32);
    format!(
        "{:0width$}",
        rand::thread_rng().gen_range(0..upper),
        width = CONFIRMATION_CODE_LEN
    )
}

/// Timing-safe comparison to prevent timing attacks
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.iter().zip(b.iter()) {
        result |= byte_a ^ byte_b;
    }
    result == 0
}

/// Security headers for HTTP responses
pub struct SecurityHeaders;

impl SecurityHeaders {
    /// Standard security headers as name/value pairs
    pub fn standard() -> [(&'static str, &'static str); 6] {
        [
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
            ("referrer-policy", "strict-origin-when-cross-origin"),
            ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
            (
                "strict-transport-security",
                "max-age=31536000; includeSubDomains",
            ),
            (
                "content-security-policy",
                "default-src 'none'; frame-ancestors 'none'",
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hasher() -> CredentialHasher {
        CredentialHasher::new(HashingConfig::fast_for_tests())
    }

    #[test]
    fn test_generate_confirmation_code() {
        for _ in 0..100 {
            let code = generate_confirmation_code();
            assert_eq!(code.len(), CONFIRMATION_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = test_hasher();
        let hashed = hasher.hash("Secret1", None).unwrap();

        assert!(hasher.verify("Secret1", &hashed).is_ok());
        assert!(matches!(
            hasher.verify("Secret2", &hashed),
            Err(HashError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_fresh_salt_per_call() {
        let hasher = test_hasher();
        let first = hasher.hash("Secret1", None).unwrap();
        let second = hasher.hash("Secret1", None).unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn test_supplied_salt_is_deterministic() {
        let hasher = test_hasher();
        let first = hasher.hash("Secret1", None).unwrap();
        let again = hasher.hash("Secret1", Some(&first.salt)).unwrap();

        assert_eq!(first, again);
    }

    #[test]
    fn test_malformed_salt() {
        let hasher = test_hasher();
        let stored = HashedPassword {
            hash: "AAAA".to_string(),
            salt: "not base64!".to_string(),
        };

        assert!(matches!(
            hasher.verify("Secret1", &stored),
            Err(HashError::Malformed(_))
        ));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hello_world"));
    }

    #[test]
    fn test_security_headers() {
        let headers = SecurityHeaders::standard();
        assert!(headers
            .iter()
            .any(|(name, _)| *name == "x-content-type-options"));
    }
}
