//! Mailgun email provider
//!
//! Sends through `POST /{domain}/messages` as a multipart form, or through
//! `smtp.mailgun.org` with domain SMTP credentials.
//!
//! ## Configuration
//!
//! - `MAILGUN_API_KEY`, `MAILGUN_DOMAIN` - required
//! - `MAILGUN_API_URL` - use `https://api.eu.mailgun.net/v3` for EU domains
//! - `MAILGUN_USE_SMTP`, `MAILGUN_SMTP_HOST`, `MAILGUN_SMTP_PORT`,
//!   `MAILGUN_SMTP_USERNAME`, `MAILGUN_SMTP_PASSWORD` - SMTP mode

use super::{check_credentials, status_error, Delivery, EmailProvider};
use crate::config::{env_flag, env_optional, env_or_default, env_parse, env_required, shared_from_address, shared_from_name};
use crate::error::{EmailError, EmailResult};
use crate::models::{SendOptions, SentEmail};
use crate::provider::smtp::{SmtpConfig, DEFAULT_SMTP_PORT};
use crate::validation::{format_address, validate_email_params};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

/// Mailgun API base URL (US region).
pub const MAILGUN_API_URL: &str = "https://api.mailgun.net/v3";

/// Mailgun SMTP host.
pub const MAILGUN_SMTP_HOST: &str = "smtp.mailgun.org";

/// Mailgun configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailgunConfig {
    pub api_key: String,
    /// Sending domain registered with Mailgun
    pub domain: String,
    pub from_email: String,
    pub from_name: String,
    pub api_url: String,
    pub use_smtp: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}

impl MailgunConfig {
    pub fn new(
        api_key: impl Into<String>,
        domain: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            domain: domain.into(),
            from_email: from_email.into(),
            from_name: from_name.into(),
            api_url: MAILGUN_API_URL.to_string(),
            use_smtp: false,
            smtp_host: MAILGUN_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: None,
            smtp_password: None,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Switch to SMTP mode with domain SMTP credentials
    pub fn with_smtp_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.use_smtp = true;
        self.smtp_username = Some(username.into());
        self.smtp_password = Some(password.into());
        self
    }

    pub fn from_env() -> EmailResult<Self> {
        let mut config = Self::new(
            env_required("MAILGUN_API_KEY")?,
            env_required("MAILGUN_DOMAIN")?,
            shared_from_address("MAILGUN_FROM_EMAIL")?,
            shared_from_name("MAILGUN_FROM_NAME"),
        )
        .with_api_url(env_or_default("MAILGUN_API_URL", MAILGUN_API_URL));
        config.use_smtp = env_flag("MAILGUN_USE_SMTP", false);
        config.smtp_host = env_or_default("MAILGUN_SMTP_HOST", MAILGUN_SMTP_HOST);
        config.smtp_port = env_parse("MAILGUN_SMTP_PORT", DEFAULT_SMTP_PORT)?;
        config.smtp_username = env_optional("MAILGUN_SMTP_USERNAME");
        config.smtp_password = env_optional("MAILGUN_SMTP_PASSWORD");
        Ok(config)
    }

    /// SMTP settings; fails when the SMTP login is incomplete.
    pub fn smtp_config(&self) -> EmailResult<SmtpConfig> {
        match (&self.smtp_username, &self.smtp_password) {
            (Some(username), Some(password)) => Ok(SmtpConfig::new(
                &self.smtp_host,
                self.smtp_port,
                &self.from_email,
                &self.from_name,
            )
            .with_tls(true)
            .with_credentials(username, password)),
            _ => Err(EmailError::Config(
                "Mailgun SMTP mode requires MAILGUN_SMTP_USERNAME and MAILGUN_SMTP_PASSWORD"
                    .to_string(),
            )),
        }
    }
}

/// Mailgun email provider
pub struct MailgunProvider {
    config: MailgunConfig,
    delivery: Delivery,
}

impl MailgunProvider {
    pub fn new(config: MailgunConfig) -> EmailResult<Self> {
        let smtp = if config.use_smtp {
            Some(config.smtp_config()?)
        } else {
            None
        };
        let delivery = Delivery::new("mailgun", smtp)?;
        Ok(Self { config, delivery })
    }

    pub fn from_env() -> EmailResult<Self> {
        Self::new(MailgunConfig::from_env()?)
    }

    pub fn config(&self) -> &MailgunConfig {
        &self.config
    }

    async fn build_form(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<Form> {
        let from = format_address(
            options.sender(&self.config.from_email),
            Some(options.sender_name(&self.config.from_name)),
        );

        let mut form = Form::new()
            .text("from", from)
            .text("to", to.to_string())
            .text("subject", subject.to_string())
            .text("html", body.to_string());

        for cc in &options.cc {
            form = form.text("cc", cc.clone());
        }

        for bcc in &options.bcc {
            form = form.text("bcc", bcc.clone());
        }

        for attachment in &options.attachments {
            let part = Part::bytes(attachment.read().await?)
                .file_name(attachment.name.clone())
                .mime_str(attachment.mime_type())
                .map_err(|e| {
                    EmailError::Provider(format!(
                        "Invalid attachment type '{}': {}",
                        attachment.mime_type(),
                        e
                    ))
                })?;
            form = form.part("attachment", part);
        }

        Ok(form)
    }

    async fn send_via_api(
        &self,
        client: &Client,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail> {
        let form = self.build_form(to, subject, body, options).await?;

        let response = client
            .post(format!("{}/{}/messages", self.config.api_url, self.config.domain))
            .basic_auth("api", Some(&self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| EmailError::Provider(format!("Failed to send email via Mailgun API: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let message_id = response
                .json::<MailgunResponse>()
                .await
                .ok()
                .and_then(|reply| reply.id);

            info!(to = %to, message_id = ?message_id, "Email sent successfully via Mailgun");
            return Ok(SentEmail::new("mailgun", message_id));
        }

        let text = response.text().await.unwrap_or_default();
        let error_body = serde_json::from_str::<MailgunResponse>(&text)
            .ok()
            .and_then(|reply| reply.message)
            .unwrap_or(text);

        error!(to = %to, status = %status, error = %error_body, "Failed to send email via Mailgun API");
        Err(status_error("Mailgun", status, &error_body))
    }
}

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl EmailProvider for MailgunProvider {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail> {
        validate_email_params(to, subject, body)?;

        debug!(
            to = %to,
            subject = %subject,
            domain = %self.config.domain,
            smtp = self.delivery.is_smtp(),
            "Sending email via Mailgun"
        );

        match &self.delivery {
            Delivery::Api(client) => self.send_via_api(client, to, subject, body, options).await,
            Delivery::Smtp(smtp) => smtp.send(to, subject, body, options).await,
        }
    }

    async fn is_available(&self) -> EmailResult<bool> {
        let client = match &self.delivery {
            Delivery::Api(client) => client,
            Delivery::Smtp(smtp) => return smtp.is_available().await,
        };

        match client
            .get(format!("{}/domains/{}", self.config.api_url, self.config.domain))
            .basic_auth("api", Some(&self.config.api_key))
            .send()
            .await
        {
            Ok(response) => {
                check_credentials(response.status())?;
                Ok(response.status().is_success())
            }
            Err(e) => {
                debug!(error = %e, domain = %self.config.domain, "Mailgun availability check failed");
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "mailgun"
    }
}
