use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Ephemeral forgotten-password ticket, at most one live per user.
///
/// Issued by `forget_password`, consumed by a successful reset. The secret is
/// held only as its digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetTicket {
    pub user_id: u32,
    pub secret_digest: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetTicket {
    /// Create a ticket from an already-digested secret.
    pub fn new(user_id: u32, secret_digest: String, timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            secret_digest,
            issued_at: now,
            expires_at: now + timeout,
        }
    }

    /// Check if this ticket is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
