//! Email provider implementations

pub mod mailgun;
pub mod mock;
pub mod postmark;
pub mod sendgrid;
pub mod smtp;

pub use mailgun::{MailgunConfig, MailgunProvider};
pub use mock::MockProvider;
pub use postmark::{PostmarkConfig, PostmarkProvider};
pub use sendgrid::{SendGridConfig, SendGridProvider};
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::{EmailError, EmailResult};
use crate::models::{SendOptions, SentEmail};
use async_trait::async_trait;

/// Trait for email providers
///
/// The failover mailer treats every implementation as opaque: it probes
/// [`is_available`](EmailProvider::is_available), then makes exactly one
/// [`send`](EmailProvider::send) attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email. `Ok` only when the transport accepted the message.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail>;

    /// Liveness probe.
    ///
    /// Ordinary downtime (network errors, 5xx) is `Ok(false)`. An `Err` means
    /// the provider is misconfigured, e.g. its credentials were rejected.
    async fn is_available(&self) -> EmailResult<bool>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// How a hosted provider hands messages over: its HTTP API or plain SMTP.
pub(crate) enum Delivery {
    Api(reqwest::Client),
    Smtp(SmtpProvider),
}

impl Delivery {
    pub(crate) fn new(name: &str, smtp: Option<SmtpConfig>) -> EmailResult<Self> {
        match smtp {
            Some(config) => Ok(Self::Smtp(SmtpProvider::new(config)?.with_name(name))),
            None => Ok(Self::Api(reqwest::Client::new())),
        }
    }

    pub(crate) fn is_smtp(&self) -> bool {
        matches!(self, Self::Smtp(_))
    }
}

/// Reject an availability check answered with 401 or 403.
pub(crate) fn check_credentials(status: reqwest::StatusCode) -> EmailResult<()> {
    match status.as_u16() {
        401 | 403 => Err(EmailError::Provider("authentication failed".to_string())),
        _ => Ok(()),
    }
}

/// Map a failed HTTP status to a provider error.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> EmailError {
    match status.as_u16() {
        429 => EmailError::Provider("rate limit exceeded".to_string()),
        400 | 422 => EmailError::Provider(format!("invalid request: {}", body)),
        401 | 403 => EmailError::Provider("authentication failed".to_string()),
        _ => EmailError::Provider(format!("{} error ({}): {}", provider, status, body)),
    }
}
