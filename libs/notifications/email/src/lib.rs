//! Outbound email with provider failover
//!
//! Routes each message across interchangeable transport providers. The
//! default provider is tried first, then the remaining providers in
//! registration order; the first provider that accepts the message wins.
//!
//! ## Components
//!
//! - **Failover**: `FailoverMailer` - provider registry, ordering and error aggregation
//! - **Providers**: SendGrid, Postmark, Mailgun (HTTP API or SMTP), plain SMTP, and Mock
//! - **Models**: `SendOptions`, `Attachment`, `SentEmail`
//! - **Validation**: recipient/subject/body precondition checks
//! - **Config**: `FailoverConfig` and env helpers used by the providers
//!
//! ## Usage
//!
//! ```ignore
//! use email_failover::{FailoverConfig, FailoverMailer, SendGridProvider, SendOptions, SmtpProvider};
//!
//! let mut mailer = FailoverMailer::from_config(&FailoverConfig::from_env());
//! mailer
//!     .add_provider(SendGridProvider::from_env()?)
//!     .add_provider(SmtpProvider::from_env()?);
//!
//! let sent = mailer
//!     .send("user@example.com", "Welcome", "<p>Hello!</p>", &SendOptions::new())
//!     .await?;
//! tracing::info!(provider = %sent.provider, "delivered");
//! ```

pub mod config;
pub mod error;
pub mod failover;
pub mod models;
pub mod provider;
pub mod validation;

// Re-export main types
pub use config::FailoverConfig;
pub use error::{EmailError, EmailResult, ProviderFailure};
pub use failover::FailoverMailer;
pub use models::{Attachment, SendOptions, SentEmail};

pub use provider::{
    EmailProvider, MailgunConfig, MailgunProvider, MockProvider, PostmarkConfig,
    PostmarkProvider, SendGridConfig, SendGridProvider, SmtpConfig, SmtpProvider,
};
