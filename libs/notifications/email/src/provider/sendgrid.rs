//! SendGrid email provider implementation.
//!
//! Sends through the v3 HTTP API by default, or through
//! `smtp.sendgrid.net` when SMTP mode is enabled.

use super::{check_credentials, status_error, Delivery, EmailProvider};
use crate::config::{env_flag, env_or_default, env_parse, env_required, shared_from_address, shared_from_name};
use crate::error::{EmailError, EmailResult};
use crate::models::{SendOptions, SentEmail};
use crate::provider::smtp::{SmtpConfig, DEFAULT_SMTP_PORT};
use crate::validation::validate_email_params;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// SendGrid API base URL.
pub const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3";

/// SendGrid SMTP relay host.
pub const SENDGRID_SMTP_HOST: &str = "smtp.sendgrid.net";

/// SendGrid API configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendGridConfig {
    /// SendGrid API key, also the SMTP password.
    pub api_key: String,
    /// Sender email address.
    pub from_email: String,
    /// Sender name.
    pub from_name: String,
    /// SendGrid API base URL (defaults to production).
    pub api_url: String,
    /// Send through SMTP instead of the HTTP API.
    pub use_smtp: bool,
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP relay port.
    pub smtp_port: u16,
}

impl SendGridConfig {
    /// Create a new SendGrid configuration.
    pub fn new(
        api_key: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            from_email: from_email.into(),
            from_name: from_name.into(),
            api_url: SENDGRID_API_URL.to_string(),
            use_smtp: false,
            smtp_host: SENDGRID_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_smtp(mut self, use_smtp: bool) -> Self {
        self.use_smtp = use_smtp;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// Expects:
    /// - `SENDGRID_API_KEY`
    /// - `SENDGRID_FROM_EMAIL` or `EMAIL_FROM_ADDRESS`
    /// - `SENDGRID_FROM_NAME` or `EMAIL_FROM_NAME` (optional)
    /// - `SENDGRID_USE_SMTP`, `SENDGRID_SMTP_HOST`, `SENDGRID_SMTP_PORT` (optional)
    pub fn from_env() -> EmailResult<Self> {
        let mut config = Self::new(
            env_required("SENDGRID_API_KEY")?,
            shared_from_address("SENDGRID_FROM_EMAIL")?,
            shared_from_name("SENDGRID_FROM_NAME"),
        )
        .with_api_url(env_or_default("SENDGRID_API_URL", SENDGRID_API_URL))
        .with_smtp(env_flag("SENDGRID_USE_SMTP", false));
        config.smtp_host = env_or_default("SENDGRID_SMTP_HOST", SENDGRID_SMTP_HOST);
        config.smtp_port = env_parse("SENDGRID_SMTP_PORT", DEFAULT_SMTP_PORT)?;
        Ok(config)
    }

    /// SMTP settings; SendGrid authenticates as `apikey` with the API key.
    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig::new(
            &self.smtp_host,
            self.smtp_port,
            &self.from_email,
            &self.from_name,
        )
        .with_tls(true)
        .with_credentials("apikey", &self.api_key)
    }
}

/// SendGrid email provider.
pub struct SendGridProvider {
    config: SendGridConfig,
    delivery: Delivery,
}

impl SendGridProvider {
    /// Create a new SendGrid provider.
    pub fn new(config: SendGridConfig) -> EmailResult<Self> {
        let smtp = config.use_smtp.then(|| config.smtp_config());
        let delivery = Delivery::new("sendgrid", smtp)?;
        Ok(Self { config, delivery })
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> EmailResult<Self> {
        Self::new(SendGridConfig::from_env()?)
    }

    pub fn config(&self) -> &SendGridConfig {
        &self.config
    }

    async fn build_request(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SendGridRequest> {
        let mut attachments = Vec::with_capacity(options.attachments.len());
        for attachment in &options.attachments {
            attachments.push(SendGridAttachment {
                content: attachment.read_base64().await?,
                content_type: attachment.mime_type().to_string(),
                filename: attachment.name.clone(),
                disposition: "attachment",
            });
        }

        Ok(SendGridRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress::new(to)],
                cc: options.cc.iter().map(EmailAddress::new).collect(),
                bcc: options.bcc.iter().map(EmailAddress::new).collect(),
            }],
            from: EmailAddress {
                email: options.sender(&self.config.from_email).to_string(),
                name: Some(options.sender_name(&self.config.from_name).to_string())
                    .filter(|n| !n.is_empty()),
            },
            subject: subject.to_string(),
            content: vec![Content {
                content_type: "text/html".to_string(),
                value: body.to_string(),
            }],
            attachments,
        })
    }

    async fn send_via_api(
        &self,
        client: &Client,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail> {
        let request = self.build_request(to, subject, body, options).await?;

        let response = client
            .post(format!("{}/mail/send", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmailError::Provider(format!("Failed to send email via SendGrid: {}", e)))?;

        let status = response.status();
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if status == StatusCode::ACCEPTED {
            info!(to = %to, message_id = ?message_id, "Email sent successfully via SendGrid");
            return Ok(SentEmail::new("sendgrid", message_id));
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(to = %to, status = %status, error = %error_body, "Failed to send email via SendGrid");

        if status.is_success() {
            return Err(EmailError::Provider(format!(
                "SendGrid did not accept the message (status {})",
                status
            )));
        }

        // Prefer the structured error list when SendGrid returns one
        let error_message = serde_json::from_str::<SendGridError>(&error_body)
            .map(|sg_error| {
                sg_error
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or(error_body);

        Err(status_error("SendGrid", status, &error_message))
    }
}

// SendGrid API request/response structures

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    subject: String,
    content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SendGridAttachment>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<EmailAddress>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl EmailAddress {
    fn new(email: impl AsRef<str>) -> Self {
        Self {
            email: email.as_ref().to_string(),
            name: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct SendGridAttachment {
    content: String,
    #[serde(rename = "type")]
    content_type: String,
    filename: String,
    disposition: &'static str,
}

#[derive(Debug, Deserialize)]
struct SendGridError {
    errors: Vec<SendGridErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SendGridErrorDetail {
    message: String,
}

#[async_trait]
impl EmailProvider for SendGridProvider {
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
            cc_count = options.cc.len(),
            bcc_count = options.bcc.len(),
            smtp = self.delivery.is_smtp(),
            "Sending email via SendGrid"
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
            .get(format!("{}/user/profile", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => {
                check_credentials(response.status())?;
                Ok(response.status() == StatusCode::OK)
            }
            Err(e) => {
                debug!(error = %e, "SendGrid availability check failed");
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "sendgrid"
    }
}
