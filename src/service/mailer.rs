//! Mail Service
//!
//! The mail collaborator used by signup: a domain existence check and plain
//! message delivery, plus the tera templates for the confirmation email.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use lettre::{
    message::header, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use log::{debug, error, info};
use tera::{Context, Tera};
use thiserror::Error;

use crate::config::EmailConfig;
use crate::utils::validation::email_domain;

const DOMAIN_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Mail errors
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Failed to send message: {0}")]
    Transport(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Domain lookup failed: {0}")]
    Lookup(String),

    #[error("SMTP configuration error: {0}")]
    Configuration(String),
}

/// Outbound mail collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    /// `Ok(false)` only when the domain definitively does not resolve.
    ///
    /// [`SmtpMailer`] and [`LogMailer`] go through [`lookup_mail_domain`],
    /// which resolves address records rather than MX records. Resolvers whose
    /// "no such name" wording is not recognized surface as
    /// [`MailError::Lookup`], and callers let those signups through.
    async fn domain_exists(&self, email: &str) -> Result<bool, MailError>;

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Resolve the domain part of `email` through the system resolver.
///
/// Only address records are looked up, on port 25; MX records are not
/// consulted. The resolver reports a missing name through the error message
/// only, so the glibc, BSD and Windows `getaddrinfo` wordings are matched to
/// separate "no such domain" from transient failures. Any other wording is
/// returned as [`MailError::Lookup`].
pub async fn lookup_mail_domain(email: &str) -> Result<bool, MailError> {
    let Some(domain) = email_domain(email) else {
        return Ok(false);
    };

    let lookup = tokio::net::lookup_host(format!("{}:25", domain));
    match tokio::time::timeout(DOMAIN_LOOKUP_TIMEOUT, lookup).await {
        Ok(Ok(mut addrs)) => Ok(addrs.next().is_some()),
        Ok(Err(e)) => {
            let message = e.to_string();
            if is_missing_name(&message) {
                debug!("Mail domain {} does not resolve: {}", domain, message);
                Ok(false)
            } else {
                Err(MailError::Lookup(message))
            }
        }
        Err(_) => Err(MailError::Lookup(format!("lookup of {} timed out", domain))),
    }
}

fn is_missing_name(message: &str) -> bool {
    const MISSING: [&str; 3] = [
        "Name or service not known",
        "nodename nor servname provided",
        "No such host is known",
    ];
    MISSING.iter().any(|needle| message.contains(needle))
}

/// Rendered subject and body of an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Embedded email templates
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    tera: Tera,
    app_name: String,
}

impl MessageTemplates {
    pub fn new(app_name: &str) -> Result<Self, MailError> {
        let mut tera = Tera::default();

        let confirmation_text = r#"Confirm your registration

Hello {{ nickname }},

Your confirmation code is: {{ code }}

Enter it together with your nickname, email and password to finish signing up.
The code expires in {{ expires_in_minutes }} minutes.

If you did not sign up for {{ app_name }}, you can safely ignore this email.

(c) {{ current_year }} {{ app_name }}
"#;

        tera.add_raw_template("confirmation_email.txt", confirmation_text)
            .map_err(|e| MailError::Template(format!("Failed to add text template: {}", e)))?;

        Ok(Self {
            tera,
            app_name: app_name.to_string(),
        })
    }

    pub fn confirmation(
        &self,
        nickname: &str,
        code: &str,
        expires_in_minutes: u64,
    ) -> Result<RenderedMessage, MailError> {
        let mut context = Context::new();
        context.insert("nickname", nickname);
        context.insert("code", code);
        context.insert("expires_in_minutes", &expires_in_minutes);
        context.insert("app_name", &self.app_name);
        context.insert("current_year", &chrono::Utc::now().year());

        let body = self
            .tera
            .render("confirmation_email.txt", &context)
            .map_err(|e| MailError::Template(format!("Failed to render text template: {}", e)))?;

        Ok(RenderedMessage {
            subject: format!("{} confirmation code", self.app_name),
            body,
        })
    }
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| MailError::Configuration(format!("Failed to configure SMTP relay: {}", e)))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn domain_exists(&self, email: &str) -> Result<bool, MailError> {
        lookup_mail_domain(email).await
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| MailError::Address(format!("Invalid from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailError::Address(format!("Invalid recipient email: {}", e)))?)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!("Email sent successfully to: {}", to);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", to, e);
                Err(MailError::Transport(e.to_string()))
            }
        }
    }
}

/// Development mailer that writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn domain_exists(&self, email: &str) -> Result<bool, MailError> {
        lookup_mail_domain(email).await
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!("Mail to {} [{}]\n{}", to, subject, body);
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording mailer for service and router tests

    use std::sync::Mutex;

    use super::*;

    /// How the recording mailer answers domain checks
    #[derive(Debug, Clone, Copy)]
    pub enum DomainAnswer {
        Exists,
        Missing,
        LookupFails,
    }

    #[derive(Debug, Clone)]
    pub struct SentMessage {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    pub struct RecordingMailer {
        domain: DomainAnswer,
        fail_delivery: bool,
        sent: Mutex<Vec<SentMessage>>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self {
                domain: DomainAnswer::Exists,
                fail_delivery: false,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn with_domain(mut self, domain: DomainAnswer) -> Self {
            self.domain = domain;
            self
        }

        pub fn failing_delivery(mut self) -> Self {
            self.fail_delivery = true;
            self
        }

        pub fn sent(&self) -> Vec<SentMessage> {
            self.sent.lock().unwrap().clone()
        }

        /// The 6-digit code from the most recent message
        pub fn last_code(&self) -> Option<String> {
            let sent = self.sent.lock().unwrap();
            let body = &sent.last()?.body;
            let start = body.find("code is: ")? + "code is: ".len();
            body.get(start..start + 6).map(str::to_string)
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn domain_exists(&self, _email: &str) -> Result<bool, MailError> {
            match self.domain {
                DomainAnswer::Exists => Ok(true),
                DomainAnswer::Missing => Ok(false),
                DomainAnswer::LookupFails => Err(MailError::Lookup("resolver down".to_string())),
            }
        }

        async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            if self.fail_delivery {
                return Err(MailError::Transport("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push(SentMessage {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_template() {
        let templates = MessageTemplates::new("Account Service").unwrap();
        let message = templates.confirmation("alice", "048213", 60).unwrap();

        assert!(message.subject.contains("confirmation code"));
        assert!(message.body.contains("Hello alice"));
        assert!(message.body.contains("Your confirmation code is: 048213"));
        assert!(message.body.contains("60 minutes"));
    }

    #[test]
    fn test_missing_name_detection() {
        assert!(is_missing_name(
            "failed to lookup address information: Name or service not known"
        ));
        assert!(is_missing_name(
            "failed to lookup address information: nodename nor servname provided, or not known"
        ));
        assert!(is_missing_name("No such host is known. (os error 11001)"));
        assert!(!is_missing_name(
            "failed to lookup address information: Temporary failure in name resolution"
        ));
        // unrecognized wording is a lookup failure, not a missing domain
        assert!(!is_missing_name(
            "failed to lookup address information: No address associated with hostname"
        ));
    }

    #[tokio::test]
    async fn test_address_without_domain() {
        assert!(!lookup_mail_domain("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_log_mailer_delivers() {
        assert!(LogMailer
            .deliver("alice@example.com", "subject", "body")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_recording_mailer_extracts_code() {
        let mailer = testing::RecordingMailer::new();
        let templates = MessageTemplates::new("Account Service").unwrap();
        let message = templates.confirmation("alice", "048213", 60).unwrap();

        mailer
            .deliver("alice@example.com", &message.subject, &message.body)
            .await
            .unwrap();
        assert_eq!(mailer.last_code().as_deref(), Some("048213"));
    }
}
