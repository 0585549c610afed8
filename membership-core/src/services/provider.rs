//! Credential lifecycle manager.
//!
//! `UserProvider` owns every password state transition: change, two-phase
//! forgotten-password recovery, reset by secret / secret digest / security
//! answers, security-question management and lockout/expiry policy. It also
//! carries the thin user-management surface (lookups, status flips, profile
//! setters, best-effort batch operations) that account-management call sites
//! expect from the same contract.
//!
//! All mutations of a single user record are serialized through a per-user
//! async mutex, and the record is re-read from the store inside the critical
//! section, so concurrent login attempts cannot lose lockout counter updates
//! or observe stale suspension state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::MembershipConfig;
use crate::models::{PasswordOptions, PasswordResetTicket, User};
use crate::services::policy::PolicyService;
use crate::services::ServiceError;
use crate::store::{Paging, UserStore};
use crate::utils::password::{digests_match, SecretDigester};

pub struct UserProvider {
    store: Arc<dyn UserStore>,
    digester: Arc<dyn SecretDigester>,
    config: MembershipConfig,
    tickets: DashMap<u32, PasswordResetTicket>,
    user_locks: DashMap<u32, Arc<Mutex<()>>>,
}

impl UserProvider {
    pub fn new(
        store: Arc<dyn UserStore>,
        digester: Arc<dyn SecretDigester>,
        config: MembershipConfig,
    ) -> Self {
        Self {
            store,
            digester,
            config,
            tickets: DashMap::new(),
            user_locks: DashMap::new(),
        }
    }

    /// Seed a new user record with this provider's configured password
    /// defaults.
    pub fn new_user(
        &self,
        user_id: u32,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> User {
        let mut user = User::new(user_id, name, namespace);
        user.options = self.config.password_defaults.clone();
        user
    }

    // ==================== Identity resolution ====================

    pub async fn get_user(&self, user_id: u32) -> Result<Option<User>, ServiceError> {
        Ok(self.store.find_by_id(user_id).await?)
    }

    pub async fn get_user_by_identity(
        &self,
        identity: &str,
        namespace: &str,
    ) -> Result<Option<User>, ServiceError> {
        require_text(identity, "identity")?;
        Ok(self.store.find_by_identity(identity, namespace).await?)
    }

    pub async fn get_users(
        &self,
        namespace: &str,
        paging: Paging,
    ) -> Result<Vec<User>, ServiceError> {
        Ok(self.store.list(namespace, paging).await?)
    }

    pub async fn exists(&self, user_id: u32) -> Result<bool, ServiceError> {
        Ok(self.store.find_by_id(user_id).await?.is_some())
    }

    pub async fn exists_identity(
        &self,
        identity: &str,
        namespace: &str,
    ) -> Result<bool, ServiceError> {
        require_text(identity, "identity")?;
        Ok(self
            .store
            .find_by_identity(identity, namespace)
            .await?
            .is_some())
    }

    // ==================== Status flips ====================

    /// Approve or un-approve an account. Idempotent; unknown ids yield false.
    pub async fn approve(&self, user_id: u32, approved: bool) -> Result<bool, ServiceError> {
        let updated = self
            .update_user(user_id, |user| user.approved = approved)
            .await?;
        if updated {
            tracing::info!(user_id, approved, "User approval updated");
        }
        Ok(updated)
    }

    /// Suspend or unsuspend an account. Unsuspending doubles as the
    /// administrator's lockout clear.
    pub async fn suspend(&self, user_id: u32, suspended: bool) -> Result<bool, ServiceError> {
        let updated = self
            .update_user(user_id, |user| {
                user.suspended = suspended;
                if !suspended {
                    user.invalid_attempt_count = 0;
                    user.last_invalid_attempt_at = None;
                }
            })
            .await?;
        if updated {
            tracing::info!(user_id, suspended, "User suspension updated");
        }
        Ok(updated)
    }

    // ==================== Profile setters ====================

    pub async fn set_avatar(
        &self,
        user_id: u32,
        avatar: Option<&str>,
    ) -> Result<bool, ServiceError> {
        self.update_user(user_id, |user| user.avatar = avatar.map(str::to_string))
            .await
    }

    pub async fn set_email(&self, user_id: u32, email: Option<&str>) -> Result<bool, ServiceError> {
        self.update_user(user_id, |user| user.email = email.map(str::to_string))
            .await
    }

    pub async fn set_phone_number(
        &self,
        user_id: u32,
        phone_number: Option<&str>,
    ) -> Result<bool, ServiceError> {
        self.update_user(user_id, |user| {
            user.phone_number = phone_number.map(str::to_string)
        })
        .await
    }

    pub async fn set_full_name(
        &self,
        user_id: u32,
        full_name: Option<&str>,
    ) -> Result<bool, ServiceError> {
        self.update_user(user_id, |user| user.full_name = full_name.map(str::to_string))
            .await
    }

    pub async fn set_description(
        &self,
        user_id: u32,
        description: Option<&str>,
    ) -> Result<bool, ServiceError> {
        self.update_user(user_id, |user| {
            user.description = description.map(str::to_string)
        })
        .await
    }

    pub async fn set_principal_id(
        &self,
        user_id: u32,
        principal_id: Option<&str>,
    ) -> Result<bool, ServiceError> {
        self.update_user(user_id, |user| {
            user.principal_id = principal_id.map(str::to_string)
        })
        .await
    }

    // ==================== Create / update / delete ====================

    /// Create a user and set its password. Returns false when the id or any
    /// login identity is already taken.
    pub async fn create_user(&self, mut user: User, password: &str) -> Result<bool, ServiceError> {
        require_text(&user.name, "identity")?;
        PolicyService::validate_password(password, &user.options)?;

        user.password_digest = Some(self.digester.digest(password));
        let created = self.try_create(&user).await?;
        if created {
            tracing::info!(user_id = user.user_id, namespace = %user.namespace, "User created");
        }
        Ok(created)
    }

    /// Best-effort batch create; no passwords are set. Returns how many
    /// records succeeded.
    pub async fn create_users(&self, users: Vec<User>) -> Result<u32, ServiceError> {
        let mut created = 0;
        for user in users {
            if user.name.trim().is_empty() {
                tracing::debug!(user_id = user.user_id, "Skipping user with blank identity");
                continue;
            }
            match self.try_create(&user).await {
                Ok(true) => created += 1,
                Ok(false) => {
                    tracing::debug!(user_id = user.user_id, "Skipping duplicate user")
                }
                Err(err) => {
                    tracing::warn!(user_id = user.user_id, error = %err, "Failed to create user")
                }
            }
        }
        Ok(created)
    }

    /// Best-effort batch update of profile, status and policy fields.
    /// Credential state is owned by the password operations and is never
    /// overwritten here.
    pub async fn update_users(&self, users: Vec<User>) -> Result<u32, ServiceError> {
        let mut updated = 0;
        for user in users {
            let result = self
                .update_user(user.user_id, |existing| {
                    existing.name = user.name.clone();
                    existing.email = user.email.clone();
                    existing.phone_number = user.phone_number.clone();
                    existing.namespace = user.namespace.clone();
                    existing.avatar = user.avatar.clone();
                    existing.full_name = user.full_name.clone();
                    existing.description = user.description.clone();
                    existing.principal_id = user.principal_id.clone();
                    existing.approved = user.approved;
                    existing.suspended = user.suspended;
                    existing.options = user.options.clone();
                })
                .await;
            match result {
                Ok(true) => updated += 1,
                Ok(false) => {
                    tracing::debug!(user_id = user.user_id, "Skipping unknown user")
                }
                Err(err) => {
                    tracing::warn!(user_id = user.user_id, error = %err, "Failed to update user")
                }
            }
        }
        Ok(updated)
    }

    /// Delete the given users, dropping any live reset tickets with them.
    pub async fn delete_users(&self, user_ids: &[u32]) -> Result<u32, ServiceError> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.delete(user_ids).await?;
        for user_id in user_ids {
            self.tickets.remove(user_id);
            self.user_locks.remove(user_id);
        }
        if deleted > 0 {
            tracing::info!(deleted, "Users deleted");
        }
        Ok(deleted)
    }

    // ==================== Login verification ====================

    /// Verify a login credential. Wrong password is a plain false with
    /// lockout bookkeeping; a suspended account or an expired password
    /// surface as distinct errors so the caller can route accordingly.
    pub async fn authenticate(
        &self,
        identity: &str,
        namespace: &str,
        password: &str,
    ) -> Result<bool, ServiceError> {
        require_text(identity, "identity")?;
        let Some(found) = self.store.find_by_identity(identity, namespace).await? else {
            return Ok(false);
        };

        let lock = self.user_lock(found.user_id);
        let _guard = lock.lock().await;
        let Some(mut user) = self.store.find_by_id(found.user_id).await? else {
            return Ok(false);
        };
        self.check_suspension(&mut user, true).await?;

        if !self.password_matches(&user, password) {
            self.register_failed_attempt(&mut user).await?;
            return Ok(false);
        }

        if user.invalid_attempt_count != 0 {
            user.invalid_attempt_count = 0;
            user.last_invalid_attempt_at = None;
            self.store.save(&user).await?;
        }

        if user.password_expired(Utc::now()) {
            return Err(ServiceError::PasswordExpired);
        }
        Ok(true)
    }

    // ==================== Password change ====================

    pub async fn change_password(
        &self,
        user_id: u32,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool, ServiceError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Ok(false);
        };
        self.check_suspension(&mut user, true).await?;

        if !self.password_matches(&user, old_password) {
            self.register_failed_attempt(&mut user).await?;
            return Ok(false);
        }

        self.apply_new_password(&mut user, new_password).await?;
        tracing::info!(user_id, "Password changed");
        Ok(true)
    }

    // ==================== Forgotten-password flow ====================

    /// Issue (or supersede) a recovery ticket for the user behind `identity`.
    /// Returns the user id, or -1 when the identity is unknown.
    pub async fn forget_password(
        &self,
        identity: &str,
        namespace: &str,
        secret: &str,
        timeout: Option<Duration>,
    ) -> Result<i64, ServiceError> {
        require_text(identity, "identity")?;
        require_text(secret, "secret")?;

        let Some(user) = self.store.find_by_identity(identity, namespace).await? else {
            return Ok(-1);
        };

        let timeout = timeout
            .unwrap_or_else(|| Duration::minutes(self.config.reset_secret_timeout_minutes));
        let ticket =
            PasswordResetTicket::new(user.user_id, self.digester.digest(secret), timeout);
        self.tickets.insert(user.user_id, ticket);

        tracing::info!(user_id = user.user_id, "Password reset secret issued");
        Ok(i64::from(user.user_id))
    }

    /// Reset by the digest of the recovery secret, keyed by user id.
    ///
    /// With `new_password` empty or absent this is verification-only and
    /// mutates nothing, not even lockout counters. A missing, expired or
    /// mismatched ticket is a plain false.
    pub async fn reset_password(
        &self,
        user_id: u32,
        secret_digest: &str,
        new_password: Option<&str>,
    ) -> Result<bool, ServiceError> {
        require_text(secret_digest, "secret")?;
        let mutating = new_password.is_some_and(|password| !password.is_empty());

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Ok(false);
        };
        self.check_suspension(&mut user, mutating).await?;

        let matched = match self.tickets.get(&user_id).map(|ticket| ticket.value().clone()) {
            Some(ticket) if ticket.is_expired() => {
                self.tickets.remove(&user_id);
                false
            }
            Some(ticket) => digests_match(secret_digest, &ticket.secret_digest),
            None => false,
        };

        if !matched {
            if mutating {
                self.register_failed_attempt(&mut user).await?;
            }
            return Ok(false);
        }

        let Some(new_password) = new_password.filter(|password| !password.is_empty()) else {
            return Ok(true);
        };

        self.apply_new_password(&mut user, new_password).await?;
        self.tickets.remove(&user_id);
        tracing::info!(user_id, "Password reset by recovery secret");
        Ok(true)
    }

    /// Reset by the plaintext recovery secret, keyed by identity.
    pub async fn reset_password_by_secret(
        &self,
        identity: &str,
        namespace: &str,
        secret: &str,
        new_password: Option<&str>,
    ) -> Result<bool, ServiceError> {
        require_text(identity, "identity")?;
        require_text(secret, "secret")?;

        let Some(user) = self.store.find_by_identity(identity, namespace).await? else {
            return Ok(false);
        };
        self.reset_password(user.user_id, &self.digester.digest(secret), new_password)
            .await
    }

    /// Reset by security-question answers. Every answer must match its stored
    /// digest, position for position and count for count.
    pub async fn reset_password_by_answers(
        &self,
        identity: &str,
        namespace: &str,
        answers: &[&str],
        new_password: Option<&str>,
    ) -> Result<bool, ServiceError> {
        require_text(identity, "identity")?;
        let mutating = new_password.is_some_and(|password| !password.is_empty());

        let Some(found) = self.store.find_by_identity(identity, namespace).await? else {
            return Ok(false);
        };

        let lock = self.user_lock(found.user_id);
        let _guard = lock.lock().await;
        let Some(mut user) = self.store.find_by_id(found.user_id).await? else {
            return Ok(false);
        };
        self.check_suspension(&mut user, mutating).await?;

        let matched = !user.password_answer_digests.is_empty()
            && answers.len() == user.password_answer_digests.len()
            && answers
                .iter()
                .zip(&user.password_answer_digests)
                .all(|(answer, stored)| digests_match(&self.digester.digest(answer), stored));

        if !matched {
            if mutating {
                self.register_failed_attempt(&mut user).await?;
            }
            return Ok(false);
        }

        let Some(new_password) = new_password.filter(|password| !password.is_empty()) else {
            return Ok(true);
        };

        self.apply_new_password(&mut user, new_password).await?;
        self.tickets.remove(&user.user_id);
        tracing::info!(user_id = user.user_id, "Password reset by security answers");
        Ok(true)
    }

    // ==================== Security questions ====================

    /// The question prompts only; answer digests are never exposed.
    pub async fn get_password_questions(
        &self,
        user_id: u32,
    ) -> Result<Option<Vec<String>>, ServiceError> {
        Ok(self
            .store
            .find_by_id(user_id)
            .await?
            .map(|user| user.password_questions))
    }

    pub async fn get_password_questions_by_identity(
        &self,
        identity: &str,
        namespace: &str,
    ) -> Result<Option<Vec<String>>, ServiceError> {
        require_text(identity, "identity")?;
        Ok(self
            .store
            .find_by_identity(identity, namespace)
            .await?
            .map(|user| user.password_questions))
    }

    /// Overwrite both question/answer sequences together, gated on the
    /// current password.
    pub async fn set_password_questions_and_answers(
        &self,
        user_id: u32,
        password: &str,
        questions: &[&str],
        answers: &[&str],
    ) -> Result<bool, ServiceError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Ok(false);
        };
        self.check_suspension(&mut user, true).await?;

        if !self.password_matches(&user, password) {
            self.register_failed_attempt(&mut user).await?;
            return Ok(false);
        }

        if questions.len() != answers.len() {
            return Err(ServiceError::InvalidArgument(
                "password questions and answers must have the same length".to_string(),
            ));
        }

        user.password_questions = questions.iter().map(|q| q.to_string()).collect();
        user.password_answer_digests = answers
            .iter()
            .map(|answer| self.digester.digest(answer))
            .collect();
        user.invalid_attempt_count = 0;
        user.last_invalid_attempt_at = None;
        self.store.save(&user).await?;

        tracing::info!(user_id, "Password questions updated");
        Ok(true)
    }

    // ==================== Password policy ====================

    /// Overwrite the user's password policy fields. No retroactive
    /// compliance check is performed.
    pub async fn set_password_options(
        &self,
        user_id: u32,
        options: PasswordOptions,
    ) -> Result<bool, ServiceError> {
        let updated = self
            .update_user(user_id, |user| user.options = options)
            .await?;
        if updated {
            tracing::debug!(user_id, "Password options updated");
        }
        Ok(updated)
    }

    // ==================== Internals ====================

    fn user_lock(&self, user_id: u32) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    async fn update_user<F>(&self, user_id: u32, apply: F) -> Result<bool, ServiceError>
    where
        F: FnOnce(&mut User),
    {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let Some(mut user) = self.store.find_by_id(user_id).await? else {
            return Ok(false);
        };
        apply(&mut user);
        Ok(self.store.save(&user).await?)
    }

    async fn try_create(&self, user: &User) -> Result<bool, ServiceError> {
        if self.store.find_by_id(user.user_id).await?.is_some() {
            return Ok(false);
        }
        let identities = [
            Some(user.name.as_str()),
            user.email.as_deref(),
            user.phone_number.as_deref(),
        ];
        for identity in identities.into_iter().flatten() {
            if self
                .store
                .find_by_identity(identity, &user.namespace)
                .await?
                .is_some()
            {
                return Ok(false);
            }
        }
        Ok(self.store.save(user).await?)
    }

    fn password_matches(&self, user: &User, password: &str) -> bool {
        match &user.password_digest {
            Some(stored) => digests_match(&self.digester.digest(password), stored),
            // No password set yet: only the empty credential matches.
            None => password.is_empty(),
        }
    }

    /// Fails with `AccountSuspended` unless the lockout window has elapsed
    /// and auto-unlock applies. The unlock is persisted only on mutating
    /// paths so verification-only calls stay read-only.
    async fn check_suspension(
        &self,
        user: &mut User,
        persist: bool,
    ) -> Result<(), ServiceError> {
        if !user.suspended {
            return Ok(());
        }
        if self.config.lockout_auto_unlock && PolicyService::auto_unlock_due(user, Utc::now()) {
            user.suspended = false;
            user.invalid_attempt_count = 0;
            user.last_invalid_attempt_at = None;
            if persist {
                self.store.save(user).await?;
                tracing::info!(
                    user_id = user.user_id,
                    "Lockout window elapsed, account unsuspended"
                );
            }
            return Ok(());
        }
        Err(ServiceError::AccountSuspended)
    }

    async fn register_failed_attempt(&self, user: &mut User) -> Result<(), ServiceError> {
        let now = Utc::now();
        user.invalid_attempt_count = if PolicyService::within_attempt_window(user, now) {
            user.invalid_attempt_count + 1
        } else {
            1
        };
        user.last_invalid_attempt_at = Some(now);

        if user.invalid_attempt_count >= user.options.max_invalid_attempts {
            user.suspended = true;
            tracing::warn!(
                user_id = user.user_id,
                attempts = user.invalid_attempt_count,
                "Account suspended after repeated credential failures"
            );
        }
        self.store.save(user).await?;
        Ok(())
    }

    async fn apply_new_password(
        &self,
        user: &mut User,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        PolicyService::validate_password(new_password, &user.options)?;

        user.password_digest = Some(self.digester.digest(new_password));
        user.options.change_password_on_first_login = false;
        user.options.password_expires_at = None;
        user.invalid_attempt_count = 0;
        user.last_invalid_attempt_at = None;
        self.store.save(user).await?;
        Ok(())
    }
}

fn require_text(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}
