//! Auth Service Implementation
//!
//! Two-phase signup (request a code, confirm it), password login and bearer
//! token operations. Every store access goes through the transaction executor.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use crate::config::SignupConfig;
use crate::database::{execute_in_tx, execute_store_tx, AccountStore, StoreError};
use crate::models::{
    Acknowledgement, AuthPayload, ConfirmSignupRequest, LoginRequest, NewPendingRegistration,
    RegistrationType, SignupRequest, TokenValidation, User, UserCredential,
};
use crate::service::jwt::{TokenError, TokenIssuer};
use crate::service::mailer::{MailError, Mailer, MessageTemplates};
use crate::utils::{
    error::AppError,
    security::{generate_confirmation_code, CredentialHasher, HashError},
    validation::messages,
};

const NO_MATCHING_REGISTRATION: &str = "no matching registration";

/// Custom error types for the auth service
#[derive(Error, Debug)]
pub enum AuthError {
    /// Field-scoped input error, formatted `"field: message"`
    #[error("Validation error: {0}")]
    Validation(String),

    /// Nickname or email already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Password did not match the stored credential
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] HashError),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Unauthorized => AuthError::Unauthorized,
            TokenError::Generation(msg) => AuthError::Token(msg),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("invalid credentials".to_string())
            }
            AuthError::Unauthorized => {
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
            AuthError::NotImplemented(what) => AppError::NotImplemented(what.to_string()),
            AuthError::Store(e) => e.into(),
            AuthError::Hashing(e) => AppError::Internal(e.to_string()),
            AuthError::Token(msg) => AppError::Internal(msg),
            AuthError::Mail(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Result type for auth service operations
pub type AuthResult<T> = Result<T, AuthError>;

fn no_matching_registration() -> AuthError {
    AuthError::NotFound(NO_MATCHING_REGISTRATION.to_string())
}

fn already_in_use(field: &str) -> AuthError {
    AuthError::Conflict(format!("{}: this {} is already in use", field, field))
}

/// Signup, login and token operations over an [`AccountStore`]
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    hasher: CredentialHasher,
    tokens: TokenIssuer,
    templates: MessageTemplates,
    config: SignupConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        hasher: CredentialHasher,
        tokens: TokenIssuer,
        config: SignupConfig,
    ) -> AuthResult<Self> {
        let templates = MessageTemplates::new(&config.app_name)?;

        Ok(Self {
            store,
            mailer,
            hasher,
            tokens,
            templates,
            config,
        })
    }

    fn pending_cutoff(&self) -> chrono::DateTime<Utc> {
        let ttl = Duration::from_std(self.config.pending_ttl).unwrap_or(Duration::hours(1));
        Utc::now() - ttl
    }

    /// Start a signup: validate, check for existing accounts, record a pending
    /// registration and mail its confirmation code.
    pub async fn begin_signup(&self, request: SignupRequest) -> AuthResult<Acknowledgement> {
        let request = request.normalized();
        request.check().map_err(AuthError::Validation)?;

        match self.mailer.domain_exists(&request.email).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(AuthError::Validation(format!(
                    "email: {}",
                    messages::UNKNOWN_EMAIL_DOMAIN
                )))
            }
            Err(e) => log::warn!("Could not verify mail domain of {}: {}", request.email, e),
        }

        let nickname = request.nickname.clone();
        let email = request.email.clone();
        let conflicts = execute_store_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move { tx.account_conflicts(&nickname, &email).await })
        })
        .await?;
        if let Some(field) = conflicts.field() {
            return Err(already_in_use(field));
        }

        let code = generate_confirmation_code();
        let pending = NewPendingRegistration {
            nickname: request.nickname.clone(),
            email: request.email.clone(),
            password: self.hasher.hash(&request.password, None)?,
            confirmation_code: code.clone(),
        };
        let stale_before = self.pending_cutoff();

        execute_in_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.purge_pending(&pending.nickname, &pending.email, stale_before)
                    .await?;

                let pending_conflicts = tx
                    .pending_conflicts(&pending.nickname, &pending.email)
                    .await?;
                if let Some(field) = pending_conflicts.field() {
                    return Err(AuthError::Conflict(format!(
                        "{}: a signup for this {} is already pending",
                        field, field
                    )));
                }

                tx.insert_pending(&pending).await?;
                Ok(())
            })
        })
        .await?;

        self.send_confirmation(&request.nickname, &request.email, &code)
            .await;

        log::info!("Signup pending confirmation for {}", request.nickname);
        Ok(Acknowledgement::ok())
    }

    async fn send_confirmation(&self, nickname: &str, email: &str, code: &str) {
        let expires_in_minutes = self.config.pending_ttl.as_secs() / 60;
        let message = match self.templates.confirmation(nickname, code, expires_in_minutes) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Failed to render confirmation email for {}: {}", email, e);
                return;
            }
        };

        if let Err(e) = self
            .mailer
            .deliver(email, &message.subject, &message.body)
            .await
        {
            log::warn!("Failed to deliver confirmation code to {}: {}", email, e);
        }
    }

    /// Finish a signup: match the pending registration, create the account
    /// and its credential together, and issue a token.
    pub async fn confirm_signup(&self, request: ConfirmSignupRequest) -> AuthResult<AuthPayload> {
        let request = request.normalized();
        request.check().map_err(AuthError::Validation)?;

        let nickname = request.nickname.clone();
        let email = request.email.clone();
        let code = request.code.clone();
        let created_after = self.pending_cutoff();
        let pending = execute_store_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.find_pending(&nickname, &email, &code, created_after)
                    .await
            })
        })
        .await?
        .ok_or_else(no_matching_registration)?;

        match self
            .hasher
            .verify(&request.password, &pending.hashed_password())
        {
            Ok(()) => {}
            Err(HashError::InvalidCredentials) => return Err(no_matching_registration()),
            Err(e) => return Err(e.into()),
        }

        let password = self.hasher.hash(&request.password, None)?;

        let pending_id = pending.id;
        let nickname = pending.nickname.clone();
        let email = pending.email.clone();
        let account_id = execute_in_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                if !tx.delete_pending(pending_id).await? {
                    return Err(no_matching_registration());
                }

                let account_id = tx.insert_account(RegistrationType::EmailPassword).await?;
                let credential = UserCredential {
                    account_id,
                    email,
                    nickname,
                    password_hash: password.hash,
                    password_salt: password.salt,
                };
                tx.insert_credential(&credential).await.map_err(|e| match e {
                    StoreError::Conflict { field } => already_in_use(field),
                    other => other.into(),
                })?;

                Ok(account_id)
            })
        })
        .await?;

        let token = self.tokens.issue(account_id)?;
        log::info!("Account {} created for {}", account_id, pending.nickname);

        Ok(AuthPayload {
            token,
            user: User {
                id: account_id,
                nickname: pending.nickname,
                email: pending.email,
            },
        })
    }

    /// Password login by nickname or email
    pub async fn login(&self, request: LoginRequest) -> AuthResult<AuthPayload> {
        let request = request.normalized();
        request.check().map_err(AuthError::Validation)?;

        let login = request.login.clone();
        let credential = execute_store_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move { tx.find_credential_by_login(&login).await })
        })
        .await?
        .ok_or_else(|| AuthError::NotFound("account not found".to_string()))?;

        match self
            .hasher
            .verify(&request.password, &credential.hashed_password())
        {
            Ok(()) => {}
            Err(HashError::InvalidCredentials) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        }

        let token = self.tokens.issue(credential.account_id)?;
        Ok(AuthPayload {
            token,
            user: credential.into(),
        })
    }

    /// Exchange a valid bearer token for a fresh one
    pub async fn login_with_token(&self, token: &str) -> AuthResult<AuthPayload> {
        let account_id = self.tokens.verify(token)?;

        let credential = execute_store_tx(self.store.as_ref(), move |tx| {
            Box::pin(async move { tx.find_credential_by_account(account_id).await })
        })
        .await?
        .ok_or(AuthError::Unauthorized)?;

        let token = self.tokens.issue(account_id)?;
        Ok(AuthPayload {
            token,
            user: credential.into(),
        })
    }

    /// Tokens are stateless; logout only confirms the token was valid
    pub async fn logout(&self, token: &str) -> AuthResult<Acknowledgement> {
        let account_id = self.tokens.verify(token)?;
        log::info!("Account {} logged out", account_id);
        Ok(Acknowledgement::ok())
    }

    pub fn validate_token(&self, token: &str) -> AuthResult<TokenValidation> {
        let account_id = self.tokens.verify(token)?;
        Ok(TokenValidation {
            valid: true,
            account_id,
        })
    }

    pub async fn recover_password(&self) -> AuthResult<Acknowledgement> {
        Err(AuthError::NotImplemented("Password recovery"))
    }

    /// Store liveness for the health endpoint
    pub async fn store_healthy(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Store health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::HashingConfig;
    use crate::database::MemoryStore;
    use crate::service::mailer::testing::RecordingMailer;

    pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

    pub fn test_tokens() -> TokenIssuer {
        TokenIssuer::new(
            TEST_SECRET,
            "account-service",
            "account-service-api",
            Duration::hours(1),
        )
    }

    pub fn build_service(store: MemoryStore, mailer: Arc<RecordingMailer>) -> AuthService {
        AuthService::new(
            Arc::new(store),
            mailer,
            CredentialHasher::new(HashingConfig::fast_for_tests()),
            test_tokens(),
            SignupConfig::default(),
        )
        .unwrap()
    }
}
