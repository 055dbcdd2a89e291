//! PostgreSQL Store
//!
//! [`AccountStore`] backed by a sqlx connection pool. Schema lives in
//! `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::store::{AccountStore, Conflicts, StoreError, StoreResult, StoreTx};
use crate::models::{NewPendingRegistration, PendingRegistration, RegistrationType, UserCredential};

/// Map unique-index violations onto the field they protect
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("user_credentials_email_key") | Some("pending_registrations_email_key") => {
                    Some("email")
                }
                Some("user_credentials_nickname_key")
                | Some("pending_registrations_nickname_key") => Some("nickname"),
                Some("user_credentials_pkey") => Some("account_id"),
                _ => None,
            };
            if let Some(field) = field {
                return StoreError::Conflict { field };
            }
        }
    }
    StoreError::Database(err)
}

/// PostgreSQL account store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn account_conflicts(&mut self, nickname: &str, email: &str) -> StoreResult<Conflicts> {
        let row = sqlx::query(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM user_credentials WHERE lower(nickname) = lower($1)) AS nickname_exists,
                EXISTS(SELECT 1 FROM user_credentials WHERE email = $2) AS email_exists
            "#,
        )
        .bind(nickname)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Conflicts {
            nickname: row.try_get("nickname_exists")?,
            email: row.try_get("email_exists")?,
        })
    }

    async fn purge_pending(
        &mut self,
        nickname: &str,
        email: &str,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM pending_registrations
            WHERE (lower(nickname) = lower($1) AND email = $2) OR created_at < $3
            "#,
        )
        .bind(nickname)
        .bind(email)
        .bind(stale_before)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn pending_conflicts(&mut self, nickname: &str, email: &str) -> StoreResult<Conflicts> {
        let row = sqlx::query(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM pending_registrations WHERE lower(nickname) = lower($1)) AS nickname_exists,
                EXISTS(SELECT 1 FROM pending_registrations WHERE email = $2) AS email_exists
            "#,
        )
        .bind(nickname)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Conflicts {
            nickname: row.try_get("nickname_exists")?,
            email: row.try_get("email_exists")?,
        })
    }

    async fn insert_pending(&mut self, pending: &NewPendingRegistration) -> StoreResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO pending_registrations
                (nickname, email, password_hash, password_salt, confirmation_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&pending.nickname)
        .bind(&pending.email)
        .bind(&pending.password.hash)
        .bind(&pending.password.salt)
        .bind(&pending.confirmation_code)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(id)
    }

    async fn find_pending(
        &mut self,
        nickname: &str,
        email: &str,
        code: &str,
        created_after: DateTime<Utc>,
    ) -> StoreResult<Option<PendingRegistration>> {
        let pending = sqlx::query_as::<_, PendingRegistration>(
            r#"
            SELECT id, nickname, email, password_hash, password_salt,
                   confirmation_code, created_at
            FROM pending_registrations
            WHERE lower(nickname) = lower($1)
              AND email = $2
              AND confirmation_code = $3
              AND created_at > $4
            "#,
        )
        .bind(nickname)
        .bind(email)
        .bind(code)
        .bind(created_after)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(pending)
    }

    async fn delete_pending(&mut self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pending_registrations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_account(&mut self, registration_type: RegistrationType) -> StoreResult<Uuid> {
        let account_id: Uuid = sqlx::query_scalar(
            "INSERT INTO accounts (registration_type) VALUES ($1) RETURNING account_id",
        )
        .bind(registration_type.as_i16())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(account_id)
    }

    async fn insert_credential(&mut self, credential: &UserCredential) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_credentials
                (account_id, email, nickname, password_hash, password_salt)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(credential.account_id)
        .bind(&credential.email)
        .bind(&credential.nickname)
        .bind(&credential.password_hash)
        .bind(&credential.password_salt)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn find_credential_by_login(
        &mut self,
        login: &str,
    ) -> StoreResult<Option<UserCredential>> {
        let credential = sqlx::query_as::<_, UserCredential>(
            r#"
            SELECT account_id, email, nickname, password_hash, password_salt
            FROM user_credentials
            WHERE email = $1 OR lower(nickname) = lower($1)
            LIMIT 1
            "#,
        )
        .bind(login)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(credential)
    }

    async fn find_credential_by_account(
        &mut self,
        account_id: Uuid,
    ) -> StoreResult<Option<UserCredential>> {
        let credential = sqlx::query_as::<_, UserCredential>(
            r#"
            SELECT account_id, email, nickname, password_hash, password_salt
            FROM user_credentials
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(credential)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
