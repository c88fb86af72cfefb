//! SMTP email provider using lettre.
//!
//! Used directly for plain SMTP relays and MailHog/Mailpit, and as the
//! transport behind the SMTP mode of the SendGrid, Postmark and Mailgun
//! providers.

use super::EmailProvider;
use crate::config::{env_flag, env_optional, env_parse, env_required, shared_from_address, shared_from_name};
use crate::error::{EmailError, EmailResult};
use crate::models::{SendOptions, SentEmail};
use crate::validation::{format_address, validate_email_params};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as MailAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Submission port used by all hosted providers.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Default sender email address.
    pub from_email: String,
    /// Default sender name.
    pub from_name: String,
    /// SMTP username (optional for dev servers like Mailpit).
    pub username: Option<String>,
    /// SMTP password (optional for dev servers like Mailpit).
    pub password: Option<String>,
    /// Upgrade the connection with STARTTLS.
    pub use_tls: bool,
}

impl SmtpConfig {
    /// Create a new SMTP configuration without TLS or credentials.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            from_email: from_email.into(),
            from_name: from_name.into(),
            username: None,
            password: None,
            use_tls: false,
        }
    }

    /// Builder method to set TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Create configuration from environment variables.
    ///
    /// Expects `SMTP_HOST`; `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`
    /// and `SMTP_USE_TLS` are optional.
    pub fn from_env() -> EmailResult<Self> {
        Ok(Self {
            host: env_required("SMTP_HOST")?,
            port: env_parse("SMTP_PORT", DEFAULT_SMTP_PORT)?,
            from_email: shared_from_address("SMTP_FROM_EMAIL")?,
            from_name: shared_from_name("SMTP_FROM_NAME"),
            username: env_optional("SMTP_USERNAME"),
            password: env_optional("SMTP_PASSWORD"),
            use_tls: env_flag("SMTP_USE_TLS", true),
        })
    }
}

/// SMTP email provider.
pub struct SmtpProvider {
    name: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: Arc<SmtpConfig>,
}

impl SmtpProvider {
    /// Create a new SMTP provider named `smtp`.
    pub fn new(config: SmtpConfig) -> EmailResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self {
            name: "smtp".to_string(),
            transport,
            config: Arc::new(config),
        })
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> EmailResult<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    /// Register under a different provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    fn build_transport(config: &SmtpConfig) -> EmailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                EmailError::Config(format!("Failed to create SMTP relay for {}: {}", config.host, e))
            })?
        } else {
            // Plain transport for local dev servers like Mailpit
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Build a lettre Message, reading attachments from disk.
    async fn build_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<Message> {
        let from_address = format_address(
            options.sender(&self.config.from_email),
            Some(options.sender_name(&self.config.from_name)),
        );
        let from: Mailbox = from_address
            .parse()
            .map_err(|e| EmailError::Provider(format!("Invalid from address: {}", e)))?;

        let to: Mailbox = to
            .parse()
            .map_err(|e| EmailError::Provider(format!("Invalid to address: {}", e)))?;

        let mut builder = Message::builder().from(from).to(to).subject(subject);

        for cc in &options.cc {
            let cc_mailbox: Mailbox = cc
                .parse()
                .map_err(|e| EmailError::Provider(format!("Invalid CC address '{}': {}", cc, e)))?;
            builder = builder.cc(cc_mailbox);
        }

        for bcc in &options.bcc {
            let bcc_mailbox: Mailbox = bcc
                .parse()
                .map_err(|e| EmailError::Provider(format!("Invalid BCC address '{}': {}", bcc, e)))?;
            builder = builder.bcc(bcc_mailbox);
        }

        if options.attachments.is_empty() {
            return Ok(builder
                .header(ContentType::TEXT_HTML)
                .body(body.to_string())?);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::html(body.to_string()));
        for attachment in &options.attachments {
            let content = attachment.read().await?;
            let content_type = ContentType::parse(attachment.mime_type()).map_err(|e| {
                EmailError::Provider(format!(
                    "Invalid attachment type '{}': {}",
                    attachment.mime_type(),
                    e
                ))
            })?;
            parts = parts.singlepart(MailAttachment::new(attachment.name.clone()).body(content, content_type));
        }

        Ok(builder.multipart(parts)?)
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail> {
        validate_email_params(to, subject, body)?;

        debug!(
            provider = %self.name,
            to = %to,
            subject = %subject,
            host = %self.config.host,
            port = %self.config.port,
            cc_count = options.cc.len(),
            bcc_count = options.bcc.len(),
            attachment_count = options.attachments.len(),
            "Sending email via SMTP"
        );

        let message = self.build_message(to, subject, body, options).await?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(provider = %self.name, to = %to, error = %e, "Failed to send email via SMTP");
            EmailError::Provider(format!("Failed to send email via SMTP: {}", e))
        })?;

        if !response.is_positive() {
            return Err(EmailError::Provider(format!(
                "SMTP server rejected the message ({})",
                response.code()
            )));
        }

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            provider = %self.name,
            to = %to,
            message_id = ?message_id,
            "Email sent successfully via SMTP"
        );

        Ok(SentEmail::new(self.name.to_lowercase(), message_id))
    }

    async fn is_available(&self) -> EmailResult<bool> {
        match self.transport.test_connection().await {
            Ok(connected) => Ok(connected),
            // 5xx reply, e.g. 535 on login
            Err(e) if e.is_permanent() => Err(EmailError::Provider(format!(
                "SMTP server rejected the connection: {}",
                e
            ))),
            Err(e) => {
                warn!(provider = %self.name, host = %self.config.host, error = %e, "SMTP health check failed");
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
