#![cfg(feature = "sqlite")]

use std::{sync::Arc, time::Duration};

use belay::{
    AccountId, AuditAction, AuditStatus, AuthError, Belay, BelayBuilder, Error, LockoutConfig,
    LoginRequest, PerformerType, Registration, Role, SqliteRepositoryProvider, TokenConfig,
};
use belay_core::{
    account::LockoutState,
    repositories::{AccountRepository, AccountRepositoryProvider},
};
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;

const TEST_SECRET: &str = "this_is_a_test_secret_key_for_hs256_jwt_tokens_not_for_prod";
const PASSWORD: &str = "eiger1938north";
const WRONG_PASSWORD: &str = "wrong-password-1";

async fn setup(lockout: LockoutConfig) -> Belay<SqliteRepositoryProvider> {
    // A single connection serializes writers on the shared in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");

    BelayBuilder::new()
        .with_sqlite_pool(pool)
        .with_token_config(TokenConfig::new(TEST_SECRET))
        .with_lockout(lockout)
        .with_login_delay(Duration::from_millis(1))
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Belay")
}

async fn register(belay: &Belay<SqliteRepositoryProvider>, name: &str, role: Role) -> AccountId {
    belay
        .register(Registration::new(name, PASSWORD).with_role(role))
        .await
        .unwrap()
        .id
}

async fn fail(belay: &Belay<SqliteRepositoryProvider>, name: &str, times: usize) {
    for _ in 0..times {
        let err = belay
            .login(LoginRequest::new(name, WRONG_PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
    }
}

async fn lockout_state(belay: &Belay<SqliteRepositoryProvider>, id: AccountId) -> LockoutState {
    belay
        .repositories()
        .account()
        .find_by_id(id)
        .await
        .unwrap()
        .unwrap()
        .lockout
}

#[tokio::test]
async fn test_fifth_failure_locks_account() {
    let belay = setup(LockoutConfig::default()).await;
    let id = register(&belay, "heckmair", Role::Member).await;

    fail(&belay, "heckmair", 4).await;
    assert!(lockout_state(&belay, id).await.locked_until.is_none());

    let before = Utc::now();
    fail(&belay, "heckmair", 1).await;
    let state = lockout_state(&belay, id).await;
    assert_eq!(state.failed_login_attempts, 5);
    let until = state.locked_until.expect("account should be locked");
    let lock_minutes = (until - before).num_minutes();
    assert!((29..=30).contains(&lock_minutes), "{lock_minutes}");

    // The correct password no longer helps
    let err = belay
        .login(LoginRequest::new("heckmair", PASSWORD))
        .await
        .unwrap_err();
    match err {
        Error::Auth(AuthError::AccountLocked {
            retry_after_seconds,
        }) => assert!((1790..=1800).contains(&retry_after_seconds)),
        other => panic!("expected a locked account, got {other}"),
    }

    // Attempts while locked are not counted
    let err = belay
        .login(LoginRequest::new("heckmair", WRONG_PASSWORD))
        .await
        .unwrap_err();
    assert!(err.is_locked());
    assert_eq!(lockout_state(&belay, id).await.failed_login_attempts, 5);

    let entries = belay.audit_entries_for(id, 20).await.unwrap();
    let locked: Vec<_> = entries
        .iter()
        .filter(|e| e.action == AuditAction::AccountLocked)
        .collect();
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0].performer_type, PerformerType::System);
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.status == AuditStatus::Blocked)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_stale_failures_are_forgotten() {
    let belay = setup(LockoutConfig::default()).await;
    let id = register(&belay, "heckmair", Role::Member).await;

    fail(&belay, "heckmair", 4).await;

    let stale = (Utc::now() - chrono::Duration::minutes(130)).timestamp();
    sqlx::query("UPDATE accounts SET last_failed_login = ? WHERE id = ?")
        .bind(stale)
        .bind(id.as_i64())
        .execute(belay.repositories().pool())
        .await
        .unwrap();

    fail(&belay, "heckmair", 1).await;
    let state = lockout_state(&belay, id).await;
    assert_eq!(state.failed_login_attempts, 1);
    assert!(state.locked_until.is_none());

    belay
        .login(LoginRequest::new("heckmair", PASSWORD))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_elapsed_lock_allows_login() {
    let belay = setup(LockoutConfig::default()).await;
    let id = register(&belay, "heckmair", Role::Member).await;
    fail(&belay, "heckmair", 5).await;

    let past = (Utc::now() - chrono::Duration::minutes(1)).timestamp();
    sqlx::query("UPDATE accounts SET locked_until = ? WHERE id = ?")
        .bind(past)
        .bind(id.as_i64())
        .execute(belay.repositories().pool())
        .await
        .unwrap();

    belay
        .login(LoginRequest::new("heckmair", PASSWORD))
        .await
        .unwrap();
    assert_eq!(lockout_state(&belay, id).await, LockoutState::default());
}

#[tokio::test]
async fn test_failure_after_elapsed_lock_relocks() {
    let belay = setup(LockoutConfig::default()).await;
    let id = register(&belay, "heckmair", Role::Member).await;
    fail(&belay, "heckmair", 5).await;

    // Lock ran out a minute ago; the failures are still inside the reset window
    let past = (Utc::now() - chrono::Duration::minutes(1)).timestamp();
    sqlx::query("UPDATE accounts SET locked_until = ? WHERE id = ?")
        .bind(past)
        .bind(id.as_i64())
        .execute(belay.repositories().pool())
        .await
        .unwrap();

    fail(&belay, "heckmair", 1).await;
    let state = lockout_state(&belay, id).await;
    assert_eq!(state.failed_login_attempts, 6);
    assert!(state.is_locked_at(Utc::now()));

    let err = belay
        .login(LoginRequest::new("heckmair", PASSWORD))
        .await
        .unwrap_err();
    assert!(err.is_locked());

    let locks = belay
        .audit_entries_for(id, 20)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == AuditAction::AccountLocked)
        .count();
    assert_eq!(locks, 2);
}

#[tokio::test]
async fn test_administrators_are_exempt() {
    let belay = setup(LockoutConfig::default()).await;
    let id = register(&belay, "harrer", Role::Admin).await;
    register(&belay, "kasparek", Role::Superuser).await;

    fail(&belay, "harrer", 8).await;
    fail(&belay, "kasparek", 6).await;

    let state = lockout_state(&belay, id).await;
    assert_eq!(state.failed_login_attempts, 8);
    assert!(state.locked_until.is_none());

    belay
        .login(LoginRequest::new("harrer", PASSWORD))
        .await
        .unwrap();
    belay
        .login(LoginRequest::new("kasparek", PASSWORD))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_administrators_lock_without_exemption() {
    let belay = setup(LockoutConfig::default().with_exempt_administrators(false)).await;
    register(&belay, "harrer", Role::Admin).await;

    fail(&belay, "harrer", 5).await;
    let err = belay
        .login(LoginRequest::new("harrer", PASSWORD))
        .await
        .unwrap_err();
    assert!(err.is_locked());
}

#[tokio::test]
async fn test_disabled_lockout_counts_but_never_locks() {
    let belay = setup(LockoutConfig::disabled()).await;
    let id = register(&belay, "heckmair", Role::Member).await;

    fail(&belay, "heckmair", 7).await;
    let state = lockout_state(&belay, id).await;
    assert_eq!(state.failed_login_attempts, 7);
    assert!(state.locked_until.is_none());

    belay
        .login(LoginRequest::new("heckmair", PASSWORD))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_failures_are_all_counted() {
    let belay = Arc::new(setup(LockoutConfig::default()).await);
    let id = register(&belay, "heckmair", Role::Member).await;

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let belay = belay.clone();
            tokio::spawn(async move {
                belay
                    .login(LoginRequest::new("heckmair", WRONG_PASSWORD))
                    .await
            })
        })
        .collect();
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
    }

    let state = lockout_state(&belay, id).await;
    assert_eq!(state.failed_login_attempts, 5);
    assert!(state.locked_until.is_some());
}

#[tokio::test]
async fn test_admin_unlock() {
    let belay = setup(LockoutConfig::default()).await;
    let admin = register(&belay, "harrer", Role::Admin).await;
    let member = register(&belay, "heckmair", Role::Member).await;
    let other = register(&belay, "vorg", Role::Member).await;
    fail(&belay, "heckmair", 5).await;

    let err = belay.unlock(other, member).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::InsufficientPrivileges)));
    assert_eq!(err.client_message(), "Forbidden");
    assert!(lockout_state(&belay, member).await.locked_until.is_some());

    belay.unlock(admin, member).await.unwrap();
    assert_eq!(lockout_state(&belay, member).await, LockoutState::default());
    belay
        .login(LoginRequest::new("heckmair", PASSWORD))
        .await
        .unwrap();

    let err = belay.unlock(admin, AccountId::new(9999)).await.unwrap_err();
    assert!(err.is_not_found());

    let unlocks: Vec<_> = belay
        .audit_entries_for(member, 20)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == AuditAction::AccountUnlocked)
        .map(|e| (e.status, e.performer_id))
        .collect();
    assert_eq!(
        unlocks,
        vec![
            (AuditStatus::Success, Some(admin)),
            (AuditStatus::Blocked, Some(other)),
        ]
    );
}

#[tokio::test]
async fn test_system_unlock() {
    let belay = setup(LockoutConfig::default()).await;
    let member = register(&belay, "heckmair", Role::Member).await;
    fail(&belay, "heckmair", 5).await;

    belay.unlock_by_system(member).await.unwrap();
    belay
        .login(LoginRequest::new("heckmair", PASSWORD))
        .await
        .unwrap();
}
