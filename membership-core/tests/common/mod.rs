//! Test helper module for membership-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use membership_core::utils::{SecretDigester, Sha256Digester};
use membership_core::{MembershipConfig, MemoryUserStore, User, UserProvider};

/// Namespace all test users live in.
pub const NS: &str = "test";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .try_init();
}

/// Provider over a fresh in-memory store, with default configuration.
pub fn setup() -> (Arc<UserProvider>, Arc<MemoryUserStore>) {
    setup_with_config(MembershipConfig::default())
}

pub fn setup_with_config(
    config: MembershipConfig,
) -> (Arc<UserProvider>, Arc<MemoryUserStore>) {
    dotenvy::dotenv().ok();
    init_tracing();

    let store = Arc::new(MemoryUserStore::new());
    let provider = Arc::new(UserProvider::new(
        store.clone(),
        Arc::new(Sha256Digester),
        config,
    ));
    (provider, store)
}

/// Create and return an approved user with a password and an email identity
/// of the form `<name>@example.com`.
pub async fn seed_user(provider: &UserProvider, user_id: u32, name: &str, password: &str) -> User {
    let mut user = provider.new_user(user_id, name, NS);
    user.email = Some(format!("{name}@example.com"));
    user.approved = true;

    assert!(provider.create_user(user, password).await.unwrap());
    provider.get_user(user_id).await.unwrap().unwrap()
}

/// Digest a plaintext the way the provider under test does.
pub fn digest(plaintext: &str) -> String {
    Sha256Digester.digest(plaintext)
}
