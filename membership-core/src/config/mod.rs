use std::env;

use crate::models::PasswordOptions;
use crate::services::ServiceError;

/// Runtime configuration, loaded from the environment with defaults for
/// local development.
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub log_level: String,
    /// Default validity of a forgotten-password secret, in minutes.
    pub reset_secret_timeout_minutes: i64,
    /// Whether a lockout-suspended account unsuspends on its own once the
    /// attempt window has elapsed, or requires an explicit unsuspend.
    pub lockout_auto_unlock: bool,
    /// Password options seeded onto newly created users.
    pub password_defaults: PasswordOptions,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            reset_secret_timeout_minutes: 60,
            lockout_auto_unlock: true,
            password_defaults: PasswordOptions::default(),
        }
    }
}

impl MembershipConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        let config = MembershipConfig {
            log_level: get_env("LOG_LEVEL", "info"),
            reset_secret_timeout_minutes: parse_env(
                "RESET_SECRET_TIMEOUT_MINUTES",
                "60",
            )?,
            lockout_auto_unlock: parse_env("LOCKOUT_AUTO_UNLOCK", "true")?,
            password_defaults: PasswordOptions {
                change_password_on_first_login: parse_env(
                    "PASSWORD_CHANGE_ON_FIRST_LOGIN",
                    "false",
                )?,
                max_invalid_attempts: parse_env("PASSWORD_MAX_INVALID_ATTEMPTS", "3")?,
                min_password_length: parse_env("PASSWORD_MIN_LENGTH", "6")?,
                attempt_window_seconds: match env::var("PASSWORD_ATTEMPT_WINDOW_SECONDS") {
                    Ok(value) if !value.is_empty() => Some(parse_value(
                        "PASSWORD_ATTEMPT_WINDOW_SECONDS",
                        &value,
                    )?),
                    _ => None,
                },
                password_expires_at: None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.reset_secret_timeout_minutes <= 0 {
            return Err(ServiceError::Config(
                "RESET_SECRET_TIMEOUT_MINUTES must be positive".to_string(),
            ));
        }
        if self.password_defaults.max_invalid_attempts == 0 {
            return Err(ServiceError::Config(
                "PASSWORD_MAX_INVALID_ATTEMPTS must be greater than 0".to_string(),
            ));
        }
        if self.password_defaults.min_password_length == 0 {
            return Err(ServiceError::Config(
                "PASSWORD_MIN_LENGTH must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ServiceError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env(key, default))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ServiceError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ServiceError::Config(format!("{key}: {e}")))
}
