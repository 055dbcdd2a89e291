//! JWT Token Issuer
//!
//! Issues and verifies stateless HS256 bearer tokens bound to an account id.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::AccessTokenClaims;

/// Token errors
#[derive(Error, Debug)]
pub enum TokenError {
    /// Malformed, expired, wrongly addressed or badly signed token. The cause
    /// is deliberately not carried.
    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("Token generation failed: {0}")]
    Generation(String),
}

/// Issues bearer tokens with a symmetric secret loaded once at startup
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    expires_in: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, issuer: &str, audience: &str, expires_in: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            expires_in,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            &config.secret,
            &config.issuer,
            &config.audience,
            Duration::hours(config.expires_hours.clamp(1, JwtConfig::MAX_EXPIRES_HOURS)),
        )
    }

    /// Issue a token whose subject is `account_id`
    pub fn issue(&self, account_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessTokenClaims::new(
            account_id,
            &self.issuer,
            &self.audience,
            now,
            now + self.expires_in,
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    /// Verify signature, expiry, issuer and audience, returning the subject
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("Rejected bearer token: {}", e);
                TokenError::Unauthorized
            })?;

        Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, "account-service", "account-service-api", Duration::hours(1))
    }

    #[test]
    fn test_round_trip() {
        let issuer = issuer();
        let id = Uuid::new_v4();

        let token = issuer.issue(id).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), id);
    }

    #[test]
    fn test_from_config_clamps_expiry() {
        let config = JwtConfig {
            secret: SECRET.to_string(),
            issuer: "account-service".to_string(),
            audience: "account-service-api".to_string(),
            expires_hours: i64::MAX,
        };
        let issuer = TokenIssuer::from_config(&config);
        assert_eq!(
            issuer.expires_in,
            Duration::hours(JwtConfig::MAX_EXPIRES_HOURS)
        );

        let id = Uuid::new_v4();
        let token = issuer.issue(id).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), id);
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        assert_ne!(issuer.issue(id).unwrap(), issuer.issue(id).unwrap());
    }

    #[test]
    fn test_expired_token_rejected() {
        let expired = TokenIssuer::new(
            SECRET,
            "account-service",
            "account-service-api",
            Duration::seconds(-3600),
        );
        let token = expired.issue(Uuid::new_v4()).unwrap();

        assert!(matches!(
            issuer().verify(&token),
            Err(TokenError::Unauthorized)
        ));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let token = issuer().issue(Uuid::new_v4()).unwrap();
        let other = TokenIssuer::new(
            "another-secret-another-secret-xx",
            "account-service",
            "account-service-api",
            Duration::hours(1),
        )
        .issue(Uuid::new_v4())
        .unwrap();

        let (head_and_payload, _) = token.rsplit_once('.').unwrap();
        let (_, foreign_signature) = other.rsplit_once('.').unwrap();
        let tampered = format!("{}.{}", head_and_payload, foreign_signature);

        assert!(matches!(
            issuer().verify(&tampered),
            Err(TokenError::Unauthorized)
        ));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let foreign = TokenIssuer::new(SECRET, "account-service", "someone-else", Duration::hours(1));
        let token = foreign.issue(Uuid::new_v4()).unwrap();

        assert!(issuer().verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            issuer().verify("not.a.token"),
            Err(TokenError::Unauthorized)
        ));
        assert!(issuer().verify("").is_err());
    }
}
