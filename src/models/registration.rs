//! Pending Registration Model
//!
//! Unconfirmed signups awaiting their emailed confirmation code.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::utils::security::HashedPassword;

/// Pending registration record
///
/// Unique by nickname and by email independently. Deleted when confirmed and
/// ignored once older than the configured TTL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingRegistration {
    pub id: Uuid,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    /// 6-digit numeric code, compared as an exact string
    pub confirmation_code: String,
    pub created_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn hashed_password(&self) -> HashedPassword {
        HashedPassword {
            hash: self.password_hash.clone(),
            salt: self.password_salt.clone(),
        }
    }
}

/// Insert payload for a pending registration
#[derive(Debug, Clone)]
pub struct NewPendingRegistration {
    pub nickname: String,
    pub email: String,
    pub password: HashedPassword,
    pub confirmation_code: String,
}
