use crate::error::{EmailError, EmailResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// MIME type used when an attachment does not declare one.
pub const DEFAULT_ATTACHMENT_TYPE: &str = "application/octet-stream";

/// File attached to an outgoing email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Location of the file on disk
    pub path: PathBuf,
    /// File name shown to the recipient
    pub name: String,
    /// MIME type of the content
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            content_type: None,
        }
    }

    /// Set the MIME type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Declared MIME type, or `application/octet-stream`
    pub fn mime_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or(DEFAULT_ATTACHMENT_TYPE)
    }

    /// Read the attachment content from disk.
    pub async fn read(&self) -> EmailResult<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            EmailError::Provider(format!(
                "Failed to read attachment '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Read the attachment and encode it as standard base64.
    pub async fn read_base64(&self) -> EmailResult<String> {
        Ok(STANDARD.encode(self.read().await?))
    }
}

/// Optional per-message settings accepted by every provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendOptions {
    /// Sender address override
    #[serde(default)]
    pub from: Option<String>,
    /// Sender display name override
    #[serde(default)]
    pub from_name: Option<String>,
    /// CC recipients
    #[serde(default, deserialize_with = "one_or_many")]
    pub cc: Vec<String>,
    /// BCC recipients
    #[serde(default, deserialize_with = "one_or_many")]
    pub bcc: Vec<String>,
    /// Files to attach
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    pub fn with_cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sender address, falling back to the provider default
    pub fn sender<'a>(&'a self, default: &'a str) -> &'a str {
        self.from.as_deref().unwrap_or(default)
    }

    /// Sender display name, falling back to the provider default
    pub fn sender_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.from_name.as_deref().unwrap_or(default)
    }
}

/// Accepts either `"a@x.com"` or `["a@x.com", "b@x.com"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(address)) if address.is_empty() => Vec::new(),
        Some(OneOrMany::One(address)) => vec![address],
        Some(OneOrMany::Many(addresses)) => addresses,
        None => Vec::new(),
    })
}

/// Confirmation that a provider accepted a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Registry name of the provider that accepted the message
    pub provider: String,
    /// Provider-specific message ID, when the transport returns one
    pub message_id: Option<String>,
}

impl SentEmail {
    pub fn new(provider: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            provider: provider.into(),
            message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_accept_single_cc_and_bcc() {
        let options: SendOptions = serde_json::from_value(json!({
            "from": "sender@example.com",
            "cc": "cc@example.com",
            "bcc": ["b1@example.com", "b2@example.com"],
        }))
        .unwrap();

        assert_eq!(options.from.as_deref(), Some("sender@example.com"));
        assert_eq!(options.cc, vec!["cc@example.com"]);
        assert_eq!(options.bcc, vec!["b1@example.com", "b2@example.com"]);
        assert!(options.attachments.is_empty());
    }

    #[test]
    fn test_options_null_cc_is_empty() {
        let options: SendOptions = serde_json::from_value(json!({ "cc": null })).unwrap();
        assert!(options.cc.is_empty());
    }

    #[test]
    fn test_attachment_descriptor_type_is_optional() {
        let options: SendOptions = serde_json::from_value(json!({
            "attachments": [
                { "path": "/tmp/report.pdf", "name": "report.pdf", "type": "application/pdf" },
                { "path": "/tmp/blob.bin", "name": "blob.bin" }
            ]
        }))
        .unwrap();

        assert_eq!(options.attachments[0].mime_type(), "application/pdf");
        assert_eq!(options.attachments[1].mime_type(), DEFAULT_ATTACHMENT_TYPE);
    }

    #[test]
    fn test_sender_fallbacks() {
        let options = SendOptions::new();
        assert_eq!(options.sender("noreply@example.com"), "noreply@example.com");
        assert_eq!(options.sender_name("Notifications"), "Notifications");

        let options = options
            .with_from("ops@example.com")
            .with_from_name("Ops");
        assert_eq!(options.sender("noreply@example.com"), "ops@example.com");
        assert_eq!(options.sender_name("Notifications"), "Ops");
    }

    #[tokio::test]
    async fn test_attachment_read_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();

        let attachment = Attachment::new(&path, "hello.txt");
        assert_eq!(attachment.read_base64().await.unwrap(), "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_attachment_read_missing_file() {
        let attachment = Attachment::new("/definitely/not/here.txt", "here.txt");
        let err = attachment.read().await.unwrap_err();
        assert!(err.to_string().contains("Failed to read attachment"));
    }
}
