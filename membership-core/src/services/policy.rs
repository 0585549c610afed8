//! Password policy enforcement.
//!
//! Validates new passwords against a user's password options and decides
//! lockout state transitions. The rules live here; the provider applies them.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::{PasswordOptions, User};

/// Errors related to password policy validation.
#[derive(Debug, Clone, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min_length} characters (got {actual_length})")]
    PasswordTooShort {
        min_length: usize,
        actual_length: usize,
    },
}

/// Password policy service.
#[derive(Debug, Clone)]
pub struct PolicyService;

impl PolicyService {
    /// Validate a new password against the user's password options.
    pub fn validate_password(
        password: &str,
        options: &PasswordOptions,
    ) -> Result<(), PasswordPolicyError> {
        if password.chars().count() < options.min_password_length {
            return Err(PasswordPolicyError::PasswordTooShort {
                min_length: options.min_password_length,
                actual_length: password.chars().count(),
            });
        }
        Ok(())
    }

    /// Whether a failure at `now` continues the current run of invalid
    /// attempts. Failures older than the attempt window start a fresh run;
    /// with no window configured every failure counts toward the same run.
    pub fn within_attempt_window(user: &User, now: DateTime<Utc>) -> bool {
        match (user.options.attempt_window_seconds, user.last_invalid_attempt_at) {
            (Some(window), Some(last)) => now - last <= Duration::seconds(window as i64),
            _ => true,
        }
    }

    /// Whether the attempt window has elapsed since the last failure, so a
    /// lockout-suspended account may be unsuspended without administrator
    /// action. Never true when no window is configured.
    pub fn auto_unlock_due(user: &User, now: DateTime<Utc>) -> bool {
        match (user.options.attempt_window_seconds, user.last_invalid_attempt_at) {
            (Some(window), Some(last)) => now - last > Duration::seconds(window as i64),
            _ => false,
        }
    }
}
