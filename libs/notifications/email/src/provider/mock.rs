//! Mock email provider for testing

use super::EmailProvider;
use crate::error::{EmailError, EmailResult};
use crate::models::{SendOptions, SentEmail};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Message captured by [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub options: SendOptions,
}

/// Mock email provider that captures sent emails.
///
/// Clones share the same state, so a test can keep a handle after
/// registering the provider with a mailer.
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    available: Arc<AtomicBool>,
    failure_message: Option<String>,
    check_error: Option<String>,
    sent_emails: Arc<Mutex<Vec<CapturedEmail>>>,
    send_attempts: Arc<AtomicUsize>,
    probe_count: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create an available provider that accepts everything
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: Arc::new(AtomicBool::new(true)),
            failure_message: None,
            check_error: None,
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            send_attempts: Arc::new(AtomicUsize::new(0)),
            probe_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an available provider whose sends always fail
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::new(name)
        }
    }

    /// Create a provider whose availability check errors, as with rejected
    /// credentials
    pub fn misconfigured(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check_error: Some(message.into()),
            ..Self::new(name)
        }
    }

    /// Create a provider that reports itself unavailable
    pub fn unavailable(name: impl Into<String>) -> Self {
        let provider = Self::new(name);
        provider.set_available(false);
        provider
    }

    /// Flip the availability probe result
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `send` calls, successful or not
    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Number of `is_available` calls
    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    /// Get all accepted emails
    pub async fn sent_emails(&self) -> Vec<CapturedEmail> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of accepted emails
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Check if an email was accepted for a specific address
    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.to == email)
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail> {
        let attempt = self.send_attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(message) = &self.failure_message {
            return Err(EmailError::Provider(message.clone()));
        }

        self.sent_emails.lock().await.push(CapturedEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            options: options.clone(),
        });

        Ok(SentEmail::new(
            self.name.to_lowercase(),
            Some(format!("mock-{}-{}", self.name.to_lowercase(), attempt)),
        ))
    }

    async fn is_available(&self) -> EmailResult<bool> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.check_error {
            return Err(EmailError::Provider(message.clone()));
        }

        Ok(self.available.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
