use thiserror::Error;

use crate::services::policy::PasswordPolicyError;

/// Errors raised by the credential lifecycle manager.
///
/// Only account-state and caller-contract violations surface as errors.
/// "Not found" is a value (`None`, `false`, `-1`) and a wrong
/// password/secret/answer is a plain `false`, so callers can drive their own
/// retry UX without exception handling.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account suspended")]
    AccountSuspended,

    #[error("Password expired")]
    PasswordExpired,
}

impl From<PasswordPolicyError> for ServiceError {
    fn from(err: PasswordPolicyError) -> Self {
        ServiceError::InvalidArgument(err.to_string())
    }
}
