//! Provider failover for outbound email.
//!
//! [`FailoverMailer`] keeps a registry of [`EmailProvider`]s keyed by their
//! lower-cased name. A send tries the default provider first, then the rest
//! in registration order, and stops at the first provider that accepts the
//! message.
//!
//! Providers that report themselves unavailable are skipped silently. A
//! provider whose availability check errors (rejected credentials) or whose
//! send fails is recorded in the [`EmailError::AllProvidersFailed`]
//! diagnostic, so "the provider was down" and "the provider rejected us"
//! stay distinguishable.
//!
//! Attempts are strictly sequential and every call is awaited to
//! completion; there is no timeout or cancellation at this level.

use crate::config::FailoverConfig;
use crate::error::{EmailError, EmailResult, ProviderFailure};
use crate::models::{SendOptions, SentEmail};
use crate::provider::EmailProvider;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Routes each send across registered providers until one accepts it.
///
/// Registration needs `&mut self`. To register providers while other tasks
/// are sending, wrap the mailer in a `tokio::sync::RwLock`.
#[derive(Clone, Default)]
pub struct FailoverMailer {
    providers: Vec<(String, Arc<dyn EmailProvider>)>,
    default_provider: Option<String>,
}

impl FailoverMailer {
    /// Create an empty mailer without a default provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mailer with a seeded default.
    ///
    /// The name is not checked against the registry: it may refer to a
    /// provider added later and is resolved on every send.
    pub fn with_default_provider(name: Option<impl Into<String>>) -> Self {
        Self {
            providers: Vec::new(),
            default_provider: name
                .map(|n| n.into().to_lowercase())
                .filter(|n| !n.is_empty()),
        }
    }

    /// Create an empty mailer from loaded configuration.
    pub fn from_config(config: &FailoverConfig) -> Self {
        Self::with_default_provider(config.default_provider.clone())
    }

    /// Register a provider, replacing any provider with the same name.
    pub fn add_provider<P>(&mut self, provider: P) -> &mut Self
    where
        P: EmailProvider + 'static,
    {
        self.add_shared_provider(Arc::new(provider))
    }

    /// Register an already shared provider, replacing any with the same name.
    ///
    /// A replaced provider keeps its position in the registration order.
    pub fn add_shared_provider(&mut self, provider: Arc<dyn EmailProvider>) -> &mut Self {
        let key = provider.name().to_lowercase();

        match self.providers.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => {
                debug!(provider = %key, "Replacing registered email provider");
                entry.1 = provider;
            }
            None => {
                debug!(provider = %key, "Registering email provider");
                self.providers.push((key, provider));
            }
        }

        self
    }

    /// Designate the provider tried first.
    ///
    /// Fails with [`EmailError::ProviderNotFound`] when no provider is
    /// registered under `name`; the previous default is kept in that case.
    pub fn set_default_provider(&mut self, name: &str) -> EmailResult<&mut Self> {
        let key = name.to_lowercase();

        if !self.contains(&key) {
            return Err(EmailError::ProviderNotFound(name.to_string()));
        }

        self.default_provider = Some(key);
        Ok(self)
    }

    /// Name of the default provider, if one is set.
    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn EmailProvider>> {
        self.providers.iter().map(|(_, provider)| provider)
    }

    /// Look up a provider by name, ignoring case.
    pub fn provider(&self, name: &str) -> Option<&Arc<dyn EmailProvider>> {
        let key = name.to_lowercase();
        self.providers
            .iter()
            .find(|(registered, _)| *registered == key)
            .map(|(_, provider)| provider)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers whose availability probe currently passes.
    ///
    /// Every provider is probed on each call. A probe error counts as
    /// unavailable.
    pub async fn available_providers(&self) -> Vec<Arc<dyn EmailProvider>> {
        let mut available = Vec::new();
        for (name, provider) in &self.providers {
            match provider.is_available().await {
                Ok(true) => available.push(Arc::clone(provider)),
                Ok(false) => {}
                Err(e) => debug!(provider = %name, error = %e, "Availability check failed"),
            }
        }
        available
    }

    /// Remove every provider and clear the default.
    pub fn clear_providers(&mut self) -> &mut Self {
        self.providers.clear();
        self.default_provider = None;
        self
    }

    /// Send an email through the first provider that accepts it.
    #[instrument(skip(self, body, options), fields(default = ?self.default_provider))]
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        options: &SendOptions,
    ) -> EmailResult<SentEmail> {
        if self.providers.is_empty() {
            return Err(EmailError::NoProviders);
        }

        let mut failures = Vec::new();

        for (name, provider) in self.attempt_order() {
            match provider.is_available().await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(provider = %name, "Skipping unavailable email provider");
                    continue;
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Email provider availability check failed, trying next");
                    failures.push(ProviderFailure::new(name, e.to_string()));
                    continue;
                }
            }

            debug!(provider = %name, "Attempting email delivery");

            match provider.send(to, subject, body, options).await {
                Ok(sent) => {
                    info!(
                        provider = %name,
                        message_id = ?sent.message_id,
                        failed_attempts = failures.len(),
                        "Email accepted by provider"
                    );
                    return Ok(sent);
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Email provider failed, trying next");
                    failures.push(ProviderFailure::new(name, e.to_string()));
                }
            }
        }

        error!(
            attempted = failures.len(),
            registered = self.providers.len(),
            "All email providers exhausted"
        );

        Err(EmailError::AllProvidersFailed { failures })
    }

    /// Default provider first when it is registered, then the others in
    /// registration order. Each provider appears once.
    fn attempt_order(&self) -> Vec<(&str, &Arc<dyn EmailProvider>)> {
        let default = self
            .default_provider
            .as_deref()
            .filter(|name| self.contains(name));

        let mut order = Vec::with_capacity(self.providers.len());

        if let Some(default) = default {
            if let Some(provider) = self.provider(default) {
                order.push((default, provider));
            }
        }

        order.extend(
            self.providers
                .iter()
                .filter(|(name, _)| Some(name.as_str()) != default)
                .map(|(name, provider)| (name.as_str(), provider)),
        );

        order
    }

    fn contains(&self, key: &str) -> bool {
        self.providers.iter().any(|(name, _)| name == key)
    }
}

impl std::fmt::Debug for FailoverMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverMailer")
            .field(
                "providers",
                &self.providers.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("default_provider", &self.default_provider)
            .finish()
    }
}
