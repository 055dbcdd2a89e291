//! Service Layer
//!
//! Signup, login and token logic plus the collaborators it depends on.

pub mod auth;
pub mod jwt;
pub mod mailer;
pub mod rate_limit_service;

// Re-export services
pub use auth::{AuthError, AuthResult, AuthService};
pub use jwt::{TokenError, TokenIssuer};
pub use mailer::{LogMailer, MailError, Mailer, MessageTemplates, SmtpMailer};
pub use rate_limit_service::{RateLimit, RateLimitError, RateLimitService};
