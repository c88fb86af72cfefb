//! Environment-driven configuration.
//!
//! The orchestrator never reads the environment itself: [`FailoverConfig`]
//! is loaded once by the caller and handed to
//! [`FailoverMailer::from_config`](crate::FailoverMailer::from_config).

use crate::error::{EmailError, EmailResult};
use std::env;
use std::str::FromStr;

/// Variable holding the provider to try first.
pub const DEFAULT_PROVIDER_ENV: &str = "EMAIL_DEFAULT_PROVIDER";

/// Shared sender address fallback for all providers.
pub const FROM_ADDRESS_ENV: &str = "EMAIL_FROM_ADDRESS";

/// Shared sender name fallback for all providers.
pub const FROM_NAME_ENV: &str = "EMAIL_FROM_NAME";

/// Load an environment variable or fall back to a default.
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Load an environment variable, treating empty values as unset.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Load an environment variable or return a configuration error.
pub fn env_required(key: &str) -> EmailResult<String> {
    env_optional(key).ok_or_else(|| {
        EmailError::Config(format!(
            "Environment variable '{}' is required but not set",
            key
        ))
    })
}

/// Boolean flag: `true`/`1`/`yes` (any case) enable it.
pub fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// Parse an environment variable, falling back to a default when unset.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> EmailResult<T> {
    match env_optional(key) {
        Some(raw) => raw.parse().map_err(|_| {
            EmailError::Config(format!(
                "Failed to parse environment variable '{}': {}",
                key, raw
            ))
        }),
        None => Ok(default),
    }
}

/// Sender address shared by providers that lack their own.
pub fn shared_from_address(provider_key: &str) -> EmailResult<String> {
    env_optional(provider_key)
        .or_else(|| env_optional(FROM_ADDRESS_ENV))
        .ok_or_else(|| {
            EmailError::Config(format!("{} or {} not set", provider_key, FROM_ADDRESS_ENV))
        })
}

/// Sender name shared by providers that lack their own.
pub fn shared_from_name(provider_key: &str) -> String {
    env_optional(provider_key)
        .or_else(|| env_optional(FROM_NAME_ENV))
        .unwrap_or_else(|| "Notifications".to_string())
}

/// Orchestrator-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailoverConfig {
    /// Provider tried first; not checked against the registry.
    pub default_provider: Option<String>,
}

impl FailoverConfig {
    pub fn new(default_provider: Option<String>) -> Self {
        Self { default_provider }
    }

    /// Read `EMAIL_DEFAULT_PROVIDER`.
    pub fn from_env() -> Self {
        Self::new(env_optional(DEFAULT_PROVIDER_ENV))
    }

    /// Read the environment, letting an explicit name take precedence.
    pub fn from_env_or(explicit: Option<String>) -> Self {
        match explicit.filter(|name| !name.is_empty()) {
            Some(name) => Self::new(Some(name)),
            None => Self::from_env(),
        }
    }
}
