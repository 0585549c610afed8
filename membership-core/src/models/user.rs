//! User model - namespace-scoped member accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Password policy knobs carried per user record.
///
/// `attempt_window_seconds = None` disables the time window: lockout then
/// triggers on the attempt count alone and never auto-clears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordOptions {
    pub change_password_on_first_login: bool,
    pub max_invalid_attempts: u32,
    pub min_password_length: usize,
    pub attempt_window_seconds: Option<u64>,
    pub password_expires_at: Option<DateTime<Utc>>,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            change_password_on_first_login: false,
            max_invalid_attempts: 3,
            min_password_length: 6,
            attempt_window_seconds: None,
            password_expires_at: None,
        }
    }
}

/// User entity (namespace-scoped).
///
/// `name`, `email` and `phone_number` are all login identities, unique within
/// a namespace. Secrets are stored as opaque digests, never as plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: u32,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub namespace: String,

    pub avatar: Option<String>,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub principal_id: Option<String>,

    pub approved: bool,
    pub suspended: bool,

    pub password_digest: Option<String>,
    pub password_questions: Vec<String>,
    pub password_answer_digests: Vec<String>,
    pub invalid_attempt_count: u32,
    pub last_invalid_attempt_at: Option<DateTime<Utc>>,

    pub options: PasswordOptions,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with default password options and no password set.
    pub fn new(user_id: u32, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            email: None,
            phone_number: None,
            namespace: namespace.into(),
            avatar: None,
            full_name: None,
            description: None,
            principal_id: None,
            approved: false,
            suspended: false,
            password_digest: None,
            password_questions: Vec::new(),
            password_answer_digests: Vec::new(),
            invalid_attempt_count: 0,
            last_invalid_attempt_at: None,
            options: PasswordOptions::default(),
            created_at: Utc::now(),
        }
    }

    /// Whether `identity` matches any of this user's login identities.
    pub fn matches_identity(&self, identity: &str) -> bool {
        self.name == identity
            || self.email.as_deref() == Some(identity)
            || self.phone_number.as_deref() == Some(identity)
    }

    /// Whether the stored password is past its expiry timestamp.
    pub fn password_expired(&self, now: DateTime<Utc>) -> bool {
        self.options
            .password_expires_at
            .is_some_and(|expires| now > expires)
    }
}
