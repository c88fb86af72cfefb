//! Precondition checks shared by every provider.
//!
//! Providers call [`validate_email_params`] before building any transport
//! request, so malformed input never reaches the network.

use crate::error::{EmailError, EmailResult};
use validator::ValidateEmail;

/// Check recipient, subject and body of an outgoing email.
pub fn validate_email_params(to: &str, subject: &str, body: &str) -> EmailResult<()> {
    if to.is_empty() || !to.validate_email() {
        return Err(EmailError::Validation(
            "Invalid recipient email address".to_string(),
        ));
    }

    if subject.is_empty() {
        return Err(EmailError::Validation(
            "Email subject cannot be empty".to_string(),
        ));
    }

    if body.is_empty() {
        return Err(EmailError::Validation(
            "Email body cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Format an address with an optional display name.
pub fn format_address(email: &str, name: Option<&str>) -> String {
    match name {
        Some(n) if !n.is_empty() => format!("{} <{}>", n, email),
        _ => email.to_string(),
    }
}
