//! Account Store
//!
//! The persistence seam used by the auth service. A store hands out
//! transactions; every read and write happens through a [`StoreTx`] that is
//! either committed or rolled back as a whole.
//!
//! Nicknames are compared case-insensitively, emails are stored normalized and
//! compared exactly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewPendingRegistration, PendingRegistration, RegistrationType, UserCredential};
use crate::utils::error::AppError;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint on `field` rejected the write
    #[error("Unique constraint violated on {field}")]
    Conflict { field: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field } => {
                AppError::Conflict(format!("{}: this {} is already in use", field, field))
            }
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Which unique fields are already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Conflicts {
    pub nickname: bool,
    pub email: bool,
}

impl Conflicts {
    /// The colliding field, nickname first
    pub fn field(&self) -> Option<&'static str> {
        if self.nickname {
            Some("nickname")
        } else if self.email {
            Some("email")
        } else {
            None
        }
    }
}

/// Source of transactions
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Cheap liveness check for the health endpoint
    async fn ping(&self) -> StoreResult<()>;
}

/// One open transaction. Dropping it without calling [`commit`](StoreTx::commit)
/// discards every write made through it.
#[async_trait]
pub trait StoreTx: Send {
    /// Whether a confirmed account already holds the nickname or the email
    async fn account_conflicts(&mut self, nickname: &str, email: &str) -> StoreResult<Conflicts>;

    /// Delete pending rows for exactly this (nickname, email) pair and every
    /// pending row created before `stale_before`.
    async fn purge_pending(
        &mut self,
        nickname: &str,
        email: &str,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Whether a pending row holds the nickname or the email
    async fn pending_conflicts(&mut self, nickname: &str, email: &str) -> StoreResult<Conflicts>;

    async fn insert_pending(&mut self, pending: &NewPendingRegistration) -> StoreResult<Uuid>;

    /// Pending row matching all of nickname, email and code, created after
    /// `created_after`
    async fn find_pending(
        &mut self,
        nickname: &str,
        email: &str,
        code: &str,
        created_after: DateTime<Utc>,
    ) -> StoreResult<Option<PendingRegistration>>;

    /// Returns `false` when the row no longer exists
    async fn delete_pending(&mut self, id: Uuid) -> StoreResult<bool>;

    async fn insert_account(&mut self, registration_type: RegistrationType) -> StoreResult<Uuid>;

    async fn insert_credential(&mut self, credential: &UserCredential) -> StoreResult<()>;

    /// Credential whose email or nickname equals `login`
    async fn find_credential_by_login(&mut self, login: &str)
        -> StoreResult<Option<UserCredential>>;

    async fn find_credential_by_account(
        &mut self,
        account_id: Uuid,
    ) -> StoreResult<Option<UserCredential>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
