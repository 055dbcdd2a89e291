//! User Model
//!
//! Confirmed accounts and the credentials attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::security::HashedPassword;

/// User representation for external API responses
///
/// Carries only the public identity of an account. Password material never
/// appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account identifier
    pub id: Uuid,

    /// Unique nickname
    pub nickname: String,

    /// Unique, normalized email address
    pub email: String,
}

/// How an account came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum RegistrationType {
    /// Nickname, email and password confirmed by emailed code
    EmailPassword = 1,
}

impl RegistrationType {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

/// Account record, created exactly once per confirmed signup
#[derive(Debug, Clone)]
pub struct Account {
    pub account_id: Uuid,
    pub registration_type: RegistrationType,
    pub created_at: DateTime<Utc>,
}

/// Internal credential record
///
/// One-to-one with [`Account`] and written in the same transaction. Never
/// serialized into responses.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredential {
    pub account_id: Uuid,
    pub email: String,
    pub nickname: String,
    pub password_hash: String,
    pub password_salt: String,
}

impl UserCredential {
    pub fn hashed_password(&self) -> HashedPassword {
        HashedPassword {
            hash: self.password_hash.clone(),
            salt: self.password_salt.clone(),
        }
    }
}

impl From<UserCredential> for User {
    /// Strip password material for the public representation
    fn from(credential: UserCredential) -> Self {
        User {
            id: credential.account_id,
            nickname: credential.nickname,
            email: credential.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_from_credential_drops_password() {
        let id = Uuid::new_v4();
        let credential = UserCredential {
            account_id: id,
            email: "alice@example.com".to_string(),
            nickname: "alice".to_string(),
            password_hash: "hash".to_string(),
            password_salt: "salt".to_string(),
        };

        let user = User::from(credential);
        assert_eq!(user.id, id);

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["nickname"], "alice");
        assert!(json.get("password_hash").is_none());
    }
}
