//! Authorization policy descriptors and credential validator resolution.
//!
//! A dispatcher registers one [`AuthorizationPolicy`] per protected action in
//! a [`PolicyRegistry`] and consults it before invoking the action. Policies
//! that need a custom check resolve a [`CredentialValidator`] lazily, exactly
//! once per descriptor, from a factory looked up by name in a
//! [`ValidatorRegistry`] at configuration time. There is no runtime type
//! discovery: a name that was never registered fails fast at assignment.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;

/// Errors raised while configuring authorization policies.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("Invalid validator type: {0}")]
    InvalidValidatorType(String),
}

/// Pluggable permission check for a schema/action pair.
pub trait CredentialValidator: Send + Sync {
    /// Decide whether `identity` may perform `action_id` on `schema_id`.
    fn validate(&self, schema_id: &str, action_id: &str, identity: &str) -> bool;
}

/// Constructor for a validator instance.
pub type ValidatorFactory = Arc<dyn Fn() -> Arc<dyn CredentialValidator> + Send + Sync>;

/// Explicit name-to-factory table for validator types.
///
/// Populated once at configuration time by whoever wires the dispatcher.
#[derive(Default)]
pub struct ValidatorRegistry {
    factories: HashMap<String, ValidatorFactory>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn CredentialValidator> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<ValidatorFactory> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

/// How an action requires identity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationMode {
    /// No check at all.
    Disabled,
    /// Any authenticated identity suffices.
    Identity,
    /// A schema/action-scoped permission check is required.
    Required,
}

/// Declarative policy record attached to a protected action.
pub struct AuthorizationPolicy {
    mode: AuthorizationMode,
    schema_id: String,
    action_id: String,
    validator_name: Option<String>,
    factory: Option<ValidatorFactory>,
    validator: OnceCell<Arc<dyn CredentialValidator>>,
}

impl AuthorizationPolicy {
    /// Default policy: any authenticated identity suffices.
    pub fn new() -> Self {
        Self {
            mode: AuthorizationMode::Identity,
            schema_id: String::new(),
            action_id: String::new(),
            validator_name: None,
            factory: None,
            validator: OnceCell::new(),
        }
    }

    /// Disabled policy if `disabled`, otherwise identity-only.
    pub fn disabled(disabled: bool) -> Self {
        Self {
            mode: if disabled {
                AuthorizationMode::Disabled
            } else {
                AuthorizationMode::Identity
            },
            ..Self::new()
        }
    }

    /// Policy requiring a schema/action-scoped permission check. An empty
    /// `action_id` means a schema-level check.
    pub fn required(schema_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            mode: AuthorizationMode::Required,
            schema_id: schema_id.into(),
            action_id: action_id.into(),
            ..Self::new()
        }
    }

    pub fn mode(&self) -> AuthorizationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AuthorizationMode) {
        self.mode = mode;
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub fn validator_type(&self) -> Option<&str> {
        self.validator_name.as_deref()
    }

    /// Assign the validator type by registry name.
    ///
    /// Fails with [`AuthorizationError::InvalidValidatorType`] when the name
    /// is not registered, leaving the previous assignment and any cached
    /// instance untouched. Re-assigning the same name is a no-op that keeps
    /// the cached instance; assigning a different name clears it so the next
    /// access rebuilds against the new factory.
    pub fn set_validator_type(
        &mut self,
        name: &str,
        registry: &ValidatorRegistry,
    ) -> Result<(), AuthorizationError> {
        if self.validator_name.as_deref() == Some(name) {
            return Ok(());
        }

        let factory = registry
            .get(name)
            .ok_or_else(|| AuthorizationError::InvalidValidatorType(name.to_string()))?;

        self.validator_name = Some(name.to_string());
        self.factory = Some(factory);
        self.validator = OnceCell::new();
        Ok(())
    }

    /// Remove the validator type and drop any cached instance.
    pub fn clear_validator_type(&mut self) {
        self.validator_name = None;
        self.factory = None;
        self.validator = OnceCell::new();
    }

    /// The memoized validator instance, or `None` when no validator type is
    /// set.
    ///
    /// Construction happens at most once per descriptor: concurrent first
    /// callers block inside the cell and all observe the same instance.
    pub fn validator(&self) -> Option<Arc<dyn CredentialValidator>> {
        let factory = self.factory.as_ref()?;
        Some(self.validator.get_or_init(|| factory()).clone())
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Action-key to policy table consulted by the dispatcher.
///
/// Policies are configured mutably, then frozen behind an `Arc` on
/// registration.
#[derive(Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<AuthorizationPolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the policy for an action key, returning the shared handle.
    /// Registering again for the same key replaces the previous policy.
    pub fn register(
        &mut self,
        action_key: impl Into<String>,
        policy: AuthorizationPolicy,
    ) -> Arc<AuthorizationPolicy> {
        let policy = Arc::new(policy);
        self.policies.insert(action_key.into(), policy.clone());
        policy
    }

    pub fn get(&self, action_key: &str) -> Option<Arc<AuthorizationPolicy>> {
        self.policies.get(action_key).cloned()
    }
}
