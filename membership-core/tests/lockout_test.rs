mod common;

use chrono::{Duration, Utc};
use common::{seed_user, setup, setup_with_config, NS};
use membership_core::{MembershipConfig, ServiceError, UserStore};

#[tokio::test]
async fn test_lockout_after_max_invalid_attempts() {
    let (provider, _store) = setup();
    let user = seed_user(&provider, 1, "alice", "abc123").await;

    // max_invalid_attempts defaults to 3
    for _ in 0..3 {
        assert!(!provider
            .change_password(user.user_id, "wrong", "NewPass1")
            .await
            .unwrap());
    }

    let locked = provider.get_user(user.user_id).await.unwrap().unwrap();
    assert!(locked.suspended);
    assert_eq!(locked.invalid_attempt_count, 3);

    // Correct password no longer helps while suspended
    let result = provider
        .change_password(user.user_id, "abc123", "NewPass2")
        .await;
    assert!(matches!(result, Err(ServiceError::AccountSuspended)));

    let login = provider.authenticate("alice@example.com", NS, "abc123").await;
    assert!(matches!(login, Err(ServiceError::AccountSuspended)));
}

#[tokio::test]
async fn test_explicit_unsuspend_clears_lockout() {
    let (provider, _store) = setup();
    let user = seed_user(&provider, 1, "alice", "abc123").await;

    for _ in 0..3 {
        provider
            .change_password(user.user_id, "wrong", "NewPass1")
            .await
            .unwrap();
    }
    assert!(provider.get_user(user.user_id).await.unwrap().unwrap().suspended);

    assert!(provider.suspend(user.user_id, false).await.unwrap());

    let cleared = provider.get_user(user.user_id).await.unwrap().unwrap();
    assert!(!cleared.suspended);
    assert_eq!(cleared.invalid_attempt_count, 0);

    assert!(provider
        .change_password(user.user_id, "abc123", "NewPass2")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_auto_unlock_after_attempt_window() {
    let (provider, store) = setup();
    let user = seed_user(&provider, 1, "alice", "abc123").await;

    let mut options = user.options.clone();
    options.attempt_window_seconds = Some(60);
    provider
        .set_password_options(user.user_id, options)
        .await
        .unwrap();

    for _ in 0..3 {
        provider
            .authenticate("alice@example.com", NS, "wrong")
            .await
            .unwrap();
    }
    assert!(provider.get_user(user.user_id).await.unwrap().unwrap().suspended);

    // Rewind the last failure past the window
    let mut locked = store.find_by_id(user.user_id).await.unwrap().unwrap();
    locked.last_invalid_attempt_at = Some(Utc::now() - Duration::seconds(120));
    store.save(&locked).await.unwrap();

    // The next credential check unsuspends on its own
    assert!(provider
        .authenticate("alice@example.com", NS, "abc123")
        .await
        .unwrap());

    let unlocked = provider.get_user(user.user_id).await.unwrap().unwrap();
    assert!(!unlocked.suspended);
    assert_eq!(unlocked.invalid_attempt_count, 0);
}

#[tokio::test]
async fn test_auto_unlock_disabled_keeps_suspension() {
    let config = MembershipConfig {
        lockout_auto_unlock: false,
        ..MembershipConfig::default()
    };
    let (provider, store) = setup_with_config(config);
    let user = seed_user(&provider, 1, "alice", "abc123").await;

    let mut options = user.options.clone();
    options.attempt_window_seconds = Some(60);
    provider
        .set_password_options(user.user_id, options)
        .await
        .unwrap();

    for _ in 0..3 {
        provider
            .authenticate("alice@example.com", NS, "wrong")
            .await
            .unwrap();
    }

    let mut locked = store.find_by_id(user.user_id).await.unwrap().unwrap();
    locked.last_invalid_attempt_at = Some(Utc::now() - Duration::seconds(120));
    store.save(&locked).await.unwrap();

    // Window elapsed, but only an explicit unsuspend clears the lock
    let login = provider.authenticate("alice@example.com", NS, "abc123").await;
    assert!(matches!(login, Err(ServiceError::AccountSuspended)));
}

#[tokio::test]
async fn test_failures_outside_window_start_a_fresh_run() {
    let (provider, store) = setup();
    let user = seed_user(&provider, 1, "alice", "abc123").await;

    let mut options = user.options.clone();
    options.attempt_window_seconds = Some(60);
    provider
        .set_password_options(user.user_id, options)
        .await
        .unwrap();

    for _ in 0..2 {
        provider
            .authenticate("alice@example.com", NS, "wrong")
            .await
            .unwrap();
    }

    let mut stale = store.find_by_id(user.user_id).await.unwrap().unwrap();
    stale.last_invalid_attempt_at = Some(Utc::now() - Duration::seconds(120));
    store.save(&stale).await.unwrap();

    // Third failure lands outside the window: counter restarts instead of
    // tripping the lockout
    provider
        .authenticate("alice@example.com", NS, "wrong")
        .await
        .unwrap();

    let user = provider.get_user(user.user_id).await.unwrap().unwrap();
    assert!(!user.suspended);
    assert_eq!(user.invalid_attempt_count, 1);
}

#[tokio::test]
async fn test_successful_match_resets_counter() {
    let (provider, _store) = setup();
    let user = seed_user(&provider, 1, "alice", "abc123").await;

    for _ in 0..2 {
        provider
            .authenticate("alice@example.com", NS, "wrong")
            .await
            .unwrap();
    }
    assert_eq!(
        provider
            .get_user(user.user_id)
            .await
            .unwrap()
            .unwrap()
            .invalid_attempt_count,
        2
    );

    assert!(provider
        .authenticate("alice@example.com", NS, "abc123")
        .await
        .unwrap());
    assert_eq!(
        provider
            .get_user(user.user_id)
            .await
            .unwrap()
            .unwrap()
            .invalid_attempt_count,
        0
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_failures_do_not_lose_counter_updates() {
    let (provider, _store) = setup();
    let user = seed_user(&provider, 1, "alice", "abc123").await;

    // Keep the lockout out of the way so every failure is counted
    let mut options = user.options.clone();
    options.max_invalid_attempts = 100;
    provider
        .set_password_options(user.user_id, options)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let provider = provider.clone();
        handles.push(tokio::spawn(async move {
            provider
                .authenticate("alice@example.com", NS, "wrong")
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(!handle.await.unwrap());
    }

    // Per-user serialization: exactly 20 failures recorded
    let user = provider.get_user(user.user_id).await.unwrap().unwrap();
    assert_eq!(user.invalid_attempt_count, 20);
}
