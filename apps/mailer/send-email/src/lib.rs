//! Command-line sender for the email failover library
//!
//! Registers the providers named on the command line (each configured from
//! its own environment variables), then sends a single message through them.

pub mod cli;
pub mod telemetry;

use cli::{Cli, ProviderKind};
use email_failover::{
    EmailProvider, EmailResult, FailoverConfig, FailoverMailer, MailgunProvider, MockProvider,
    PostmarkProvider, SendGridProvider, SentEmail, SmtpProvider,
};
use eyre::{Result, WrapErr, eyre};
use std::sync::Arc;
use telemetry::{Environment, init_tracing};
use tracing::{info, warn};

fn build_provider(kind: ProviderKind) -> EmailResult<Arc<dyn EmailProvider>> {
    let provider: Arc<dyn EmailProvider> = match kind {
        ProviderKind::Sendgrid => Arc::new(SendGridProvider::from_env()?),
        ProviderKind::Postmark => Arc::new(PostmarkProvider::from_env()?),
        ProviderKind::Mailgun => Arc::new(MailgunProvider::from_env()?),
        ProviderKind::Smtp => Arc::new(SmtpProvider::from_env()?),
        ProviderKind::Mock => Arc::new(MockProvider::new("mock")),
    };
    Ok(provider)
}

/// Build a mailer from the selected providers.
///
/// Providers whose configuration is missing are skipped with a warning. It is
/// an error when none of them could be configured.
pub fn build_mailer(cli: &Cli) -> Result<FailoverMailer> {
    let config = FailoverConfig::from_env_or(cli.default_provider.clone());
    let mut mailer = FailoverMailer::from_config(&config);

    for kind in &cli.providers {
        match build_provider(*kind) {
            Ok(provider) => {
                mailer.add_shared_provider(provider);
            }
            Err(e) => warn!(provider = ?kind, error = %e, "Skipping unconfigured provider"),
        }
    }

    if mailer.is_empty() {
        return Err(eyre!(
            "No email provider could be configured from the environment"
        ));
    }

    info!(
        providers = mailer.len(),
        default_provider = ?mailer.default_provider(),
        "Mailer ready"
    );

    Ok(mailer)
}

/// Send the message described by `cli`.
pub async fn send(cli: &Cli) -> Result<SentEmail> {
    let mailer = build_mailer(cli)?;

    mailer
        .send(&cli.to, &cli.subject, &cli.body, &cli.send_options())
        .await
        .wrap_err_with(|| format!("Failed to send email to {}", cli.to))
}

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(Environment::from_env());

    let sent = send(&cli).await?;

    info!(
        provider = %sent.provider,
        message_id = ?sent.message_id,
        to = %cli.to,
        "Email sent"
    );
    println!(
        "Sent via {} (message id: {})",
        sent.provider,
        sent.message_id.as_deref().unwrap_or("n/a")
    );

    Ok(())
}
