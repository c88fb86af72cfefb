//! Postmark email provider.
//!
//! Sends emails via the Postmark HTTP API, or via `smtp.postmarkapp.com`
//! with the server token as the SMTP password.

use super::{check_credentials, status_error, Delivery, EmailProvider};
use crate::config::{env_flag, env_optional, env_or_default, env_parse, env_required, shared_from_address, shared_from_name};
use crate::error::{EmailError, EmailResult};
use crate::models::{SendOptions, SentEmail};
use crate::provider::smtp::{SmtpConfig, DEFAULT_SMTP_PORT};
use crate::validation::{format_address, validate_email_params};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Postmark API base URL.
pub const POSTMARK_API_URL: &str = "https://api.postmarkapp.com";

/// Postmark SMTP host.
pub const POSTMARK_SMTP_HOST: &str = "smtp.postmarkapp.com";

const SERVER_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// Postmark configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostmarkConfig {
    /// Server API token, also the SMTP password.
    pub server_token: String,
    pub from_email: String,
    pub from_name: String,
    pub api_url: String,
    pub use_smtp: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// SMTP login; Postmark accepts the server token when unset.
    pub smtp_username: Option<String>,
}

impl PostmarkConfig {
    pub fn new(
        server_token: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            server_token: server_token.into(),
            from_email: from_email.into(),
            from_name: from_name.into(),
            api_url: POSTMARK_API_URL.to_string(),
            use_smtp: false,
            smtp_host: POSTMARK_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: None,
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

    /// Create from environment variables
    ///
    /// Expects `POSTMARK_SERVER_TOKEN` and `POSTMARK_FROM_EMAIL` or
    /// `EMAIL_FROM_ADDRESS`.
    pub fn from_env() -> EmailResult<Self> {
        let mut config = Self::new(
            env_required("POSTMARK_SERVER_TOKEN")?,
            shared_from_address("POSTMARK_FROM_EMAIL")?,
            shared_from_name("POSTMARK_FROM_NAME"),
        )
        .with_api_url(env_or_default("POSTMARK_API_URL", POSTMARK_API_URL))
        .with_smtp(env_flag("POSTMARK_USE_SMTP", false));
        config.smtp_host = env_or_default("POSTMARK_SMTP_HOST", POSTMARK_SMTP_HOST);
        config.smtp_port = env_parse("POSTMARK_SMTP_PORT", DEFAULT_SMTP_PORT)?;
        config.smtp_username = env_optional("POSTMARK_SMTP_USERNAME");
        Ok(config)
    }

    pub fn smtp_config(&self) -> SmtpConfig {
        let username = self
            .smtp_username
            .clone()
            .unwrap_or_else(|| self.server_token.clone());
        SmtpConfig::new(
            &self.smtp_host,
            self.smtp_port,
            &self.from_email,
            &self.from_name,
        )
        .with_tls(true)
        .with_credentials(username, &self.server_token)
    }
}

/// Postmark email provider
pub struct PostmarkProvider {
    config: PostmarkConfig,
    delivery: Delivery,
}

impl PostmarkProvider {
    pub fn new(config: PostmarkConfig) -> EmailResult<Self> {
        let smtp = config.use_smtp.then(|| config.smtp_config());
        let delivery = Delivery::new("postmark", smtp)?;
        Ok(Self { config, delivery })
    }

    pub fn from_env() -> EmailResult<Self> {
        Self::new(PostmarkConfig::from_env()?)
    }

    pub fn config(&self) -> &PostmarkConfig {
        &self.config
    }

    async fn send_via_api(
        &self,
        client: &Client,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail> {
        let mut attachments = Vec::with_capacity(options.attachments.len());
        for attachment in &options.attachments {
            attachments.push(PostmarkAttachment {
                name: attachment.name.clone(),
                content: attachment.read_base64().await?,
                content_type: attachment.mime_type().to_string(),
            });
        }

        let request = PostmarkRequest {
            from: format_address(
                options.sender(&self.config.from_email),
                Some(options.sender_name(&self.config.from_name)),
            ),
            to: to.to_string(),
            cc: join_addresses(&options.cc),
            bcc: join_addresses(&options.bcc),
            subject: subject.to_string(),
            html_body: body.to_string(),
            attachments,
        };

        let response = client
            .post(format!("{}/email", self.config.api_url))
            .header(SERVER_TOKEN_HEADER, &self.config.server_token)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EmailError::Provider(format!("Failed to send email via Postmark: {}", e)))?;

        let status = response.status();
        let error_body;

        if status.is_success() {
            let reply: PostmarkResponse = response.json().await.map_err(|e| {
                EmailError::Provider(format!("Failed to read Postmark response: {}", e))
            })?;

            match reply.message_id.filter(|id| !id.is_empty()) {
                Some(message_id) => {
                    info!(to = %to, message_id = %message_id, "Email sent successfully via Postmark");
                    return Ok(SentEmail::new("postmark", Some(message_id)));
                }
                None => {
                    error_body = reply.message.unwrap_or_default();
                }
            }
        } else {
            let text = response.text().await.unwrap_or_default();
            error_body = serde_json::from_str::<PostmarkResponse>(&text)
                .ok()
                .and_then(|reply| reply.message)
                .unwrap_or(text);
        }

        error!(to = %to, status = %status, error = %error_body, "Failed to send email via Postmark");

        if status.is_success() {
            Err(EmailError::Provider(format!(
                "Postmark did not accept the message: {}",
                error_body
            )))
        } else {
            Err(status_error("Postmark", status, &error_body))
        }
    }
}

fn join_addresses(addresses: &[String]) -> Option<String> {
    (!addresses.is_empty()).then(|| addresses.join(","))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkRequest {
    from: String,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<String>,
    subject: String,
    html_body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<PostmarkAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkAttachment {
    name: String,
    content: String,
    content_type: String,
}

#[derive(Debug, Deserialize)]
struct PostmarkResponse {
    #[serde(rename = "MessageID")]
    message_id: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostmarkServer {
    #[serde(rename = "ID", default)]
    id: u64,
}

#[async_trait]
impl EmailProvider for PostmarkProvider {
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
            smtp = self.delivery.is_smtp(),
            "Sending email via Postmark"
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

        let response = client
            .get(format!("{}/server", self.config.api_url))
            .header(SERVER_TOKEN_HEADER, &self.config.server_token)
            .header("Accept", "application/json")
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Postmark availability check failed");
                return Ok(false);
            }
        };

        check_credentials(response.status())?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Postmark availability check failed");
            return Ok(false);
        }

        match response.json::<PostmarkServer>().await {
            Ok(server) => Ok(server.id != 0),
            Err(e) => {
                debug!(error = %e, "Unexpected Postmark server response");
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "postmark"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> PostmarkProvider {
        let config = PostmarkConfig::new("pm-token", "noreply@example.com", "Example")
            .with_api_url(server.uri());
        PostmarkProvider::new(config).unwrap()
    }

    #[test]
    fn test_join_addresses() {
        assert_eq!(join_addresses(&[]), None);
        assert_eq!(
            join_addresses(&["a@example.com".to_string(), "b@example.com".to_string()]).as_deref(),
            Some("a@example.com,b@example.com")
        );
    }

    #[test]
    fn test_smtp_config_defaults_username_to_token() {
        let config = PostmarkConfig::new("pm-token", "noreply@example.com", "Example");
        let smtp = config.smtp_config();
        assert_eq!(smtp.host, POSTMARK_SMTP_HOST);
        assert_eq!(smtp.username.as_deref(), Some("pm-token"));
        assert_eq!(smtp.password.as_deref(), Some("pm-token"));

        let mut config = config;
        config.smtp_username = Some("smtp-user".to_string());
        assert_eq!(config.smtp_config().username.as_deref(), Some("smtp-user"));
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("POSTMARK_SERVER_TOKEN", Some("pm-env")),
                ("POSTMARK_FROM_EMAIL", Some("pm@example.com")),
                ("POSTMARK_USE_SMTP", None),
                ("POSTMARK_SMTP_USERNAME", Some("pm-user")),
            ],
            || {
                let config = PostmarkConfig::from_env().unwrap();
                assert_eq!(config.server_token, "pm-env");
                assert_eq!(config.from_email, "pm@example.com");
                assert!(!config.use_smtp);
                assert_eq!(config.smtp_username.as_deref(), Some("pm-user"));
            },
        );
    }

    #[tokio::test]
    async fn test_send_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .and(header(SERVER_TOKEN_HEADER, "pm-token"))
            .and(body_partial_json(json!({
                "From": "Example <noreply@example.com>",
                "To": "user@example.com",
                "Cc": "a@example.com,b@example.com",
                "Subject": "Hello",
                "HtmlBody": "<p>Hi</p>",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "To": "user@example.com",
                "MessageID": "b7bc2f4a-e38e-4336-af7d-e6c392c2f817",
                "ErrorCode": 0,
                "Message": "OK",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = SendOptions::new()
            .with_cc("a@example.com")
            .with_cc("b@example.com");
        let sent = provider_for(&server)
            .send("user@example.com", "Hello", "<p>Hi</p>", &options)
            .await
            .unwrap();

        assert_eq!(sent.provider, "postmark");
        assert_eq!(
            sent.message_id.as_deref(),
            Some("b7bc2f4a-e38e-4336-af7d-e6c392c2f817")
        );
    }

    #[tokio::test]
    async fn test_send_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("invoice.pdf");
        std::fs::write(&file, "hello").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .and(body_partial_json(json!({
                "Attachments": [{
                    "Name": "invoice.pdf",
                    "Content": "aGVsbG8=",
                    "ContentType": "application/octet-stream",
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "MessageID": "m-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let options = SendOptions::new().with_attachment(Attachment::new(&file, "invoice.pdf"));
        let sent = provider_for(&server)
            .send("user@example.com", "Invoice", "Body", &options)
            .await
            .unwrap();
        assert_eq!(sent.message_id.as_deref(), Some("m-1"));
    }

    #[tokio::test]
    async fn test_send_without_message_id_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MessageID": "",
                "Message": "Queued nothing",
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .send("user@example.com", "Hello", "Body", &SendOptions::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Postmark did not accept the message: Queued nothing"
        );
    }

    #[tokio::test]
    async fn test_send_unprocessable_entity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/email"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "ErrorCode": 300,
                "Message": "Invalid 'From' address",
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .send("user@example.com", "Hello", "Body", &SendOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid request: Invalid 'From' address");
    }

    #[tokio::test]
    async fn test_is_available_checks_server_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server"))
            .and(header(SERVER_TOKEN_HEADER, "pm-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ID": 42, "Name": "prod" })))
            .mount(&server)
            .await;

        assert!(provider_for(&server).is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_is_unavailable_without_server_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Name": "prod" })))
            .mount(&server)
            .await;

        assert!(!provider_for(&server).is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_is_unavailable_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(!provider_for(&server).is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_token_is_an_availability_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider_for(&server).is_available().await.unwrap_err();
        assert_eq!(err.to_string(), "authentication failed");
    }
}
