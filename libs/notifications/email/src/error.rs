//! Error types for email delivery and provider failover.

use std::fmt;
use thiserror::Error;

/// Result type for email operations.
pub type EmailResult<T> = Result<T, EmailError>;

/// One attempted provider that did not accept the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Lower-cased registry name of the provider.
    pub provider: String,
    /// Message of the error the provider returned.
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.provider, self.message)
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// The registry was empty when a send was requested.
    #[error("No email service providers configured")]
    NoProviders,

    /// A provider name did not match any registered provider.
    #[error("Email provider not found: {0}")]
    ProviderNotFound(String),

    /// Recipient, subject or body failed the precondition checks.
    #[error("{0}")]
    Validation(String),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure inside a single provider.
    #[error("{0}")]
    Provider(String),

    /// Every attempted provider failed, or none was available.
    #[error(
        "All email service providers failed. Errors: {}",
        join_failures(.failures)
    )]
    AllProvidersFailed { failures: Vec<ProviderFailure> },
}

impl EmailError {
    /// Per-provider failures carried by an exhaustion error.
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            Self::AllProvidersFailed { failures } => failures,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        EmailError::Provider(format!("HTTP request failed: {}", err))
    }
}

impl From<std::io::Error> for EmailError {
    fn from(err: std::io::Error) -> Self {
        EmailError::Provider(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for EmailError {
    fn from(err: serde_json::Error) -> Self {
        EmailError::Provider(format!("JSON serialization error: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for EmailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        EmailError::Provider(format!("SMTP error: {}", err))
    }
}

impl From<lettre::error::Error> for EmailError {
    fn from(err: lettre::error::Error) -> Self {
        EmailError::Provider(format!("Failed to build email message: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_is_tagged() {
        let failure = ProviderFailure::new("sendgrid", "authentication failed");
        assert_eq!(failure.to_string(), "[sendgrid] authentication failed");
    }

    #[test]
    fn test_aggregate_message_joins_in_order() {
        let err = EmailError::AllProvidersFailed {
            failures: vec![
                ProviderFailure::new("a", "boom"),
                ProviderFailure::new("b", "bang"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "All email service providers failed. Errors: [a] boom; [b] bang"
        );
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_aggregate_message_without_entries() {
        let err = EmailError::AllProvidersFailed { failures: vec![] };
        assert_eq!(err.to_string(), "All email service providers failed. Errors: ");
        assert!(err.failures().is_empty());
    }

    #[test]
    fn test_failures_empty_for_other_kinds() {
        assert!(EmailError::NoProviders.failures().is_empty());
    }
}
