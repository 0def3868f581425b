#![cfg(feature = "sqlite")]

use std::time::{Duration, Instant};

use belay::{
    AuditAction, AuditStatus, AuthError, Belay, BelayBuilder, Error, LoginRequest, PerformerType,
    Registration, Role, SqliteRepositoryProvider, TokenConfig, TokenKind, ValidationError,
};
use sqlx::sqlite::SqlitePoolOptions;

const TEST_SECRET: &str = "this_is_a_test_secret_key_for_hs256_jwt_tokens_not_for_prod";
const LOGIN_DELAY: Duration = Duration::from_millis(50);

async fn setup() -> Belay<SqliteRepositoryProvider> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");

    BelayBuilder::new()
        .with_sqlite_pool(pool)
        .with_token_config(TokenConfig::new(TEST_SECRET))
        .with_login_delay(LOGIN_DELAY)
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Belay")
}

#[tokio::test]
async fn test_login_issues_tokens() {
    let belay = setup().await;
    let account = belay
        .register(Registration::new("Walter Bonatti", "k2summit1954"))
        .await
        .unwrap();

    let response = belay
        .login(LoginRequest::new("Walter Bonatti", "k2summit1954").with_source_ip("203.0.113.9"))
        .await
        .unwrap();

    assert_eq!(response.account, account);
    assert_eq!(response.tokens.expires_in, 900);
    assert_ne!(response.tokens.access_token, response.tokens.refresh_token);

    let claims = belay.authenticate(&response.tokens.access_token).unwrap();
    assert_eq!(claims.account_id().unwrap(), account.id);
    assert_eq!(claims.role, Role::Member);
    assert_eq!(claims.typ, TokenKind::Access);
}

#[tokio::test]
async fn test_response_carries_no_secrets() {
    let belay = setup().await;
    belay
        .register(Registration::new("bonatti", "k2summit1954").with_role(Role::Admin))
        .await
        .unwrap();

    let response = belay
        .login(LoginRequest::new("bonatti", "k2summit1954"))
        .await
        .unwrap();
    let json = serde_json::to_value(&response).unwrap();

    let account = json["account"].as_object().unwrap();
    let mut keys: Vec<_> = account.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["id", "login_name", "role"]);
    assert_eq!(json["account"]["role"], "admin");
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert!(!json.to_string().contains("argon2"));
}

#[tokio::test]
async fn test_unknown_name_and_wrong_password_are_indistinguishable() {
    let belay = setup().await;
    belay
        .register(Registration::new("bonatti", "k2summit1954"))
        .await
        .unwrap();

    let started = Instant::now();
    let unknown = belay
        .login(LoginRequest::new("cassin", "k2summit1954"))
        .await
        .unwrap_err();
    assert!(started.elapsed() >= LOGIN_DELAY);

    let started = Instant::now();
    let wrong = belay
        .login(LoginRequest::new("bonatti", "wrong-password-1"))
        .await
        .unwrap_err();
    assert!(started.elapsed() >= LOGIN_DELAY);

    assert!(matches!(unknown, Error::Auth(AuthError::InvalidCredentials)));
    assert!(matches!(wrong, Error::Auth(AuthError::InvalidCredentials)));
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.client_message(), wrong.client_message());
    assert!(unknown.is_unauthorized());
}

#[tokio::test]
async fn test_login_writes_audit_trail() {
    let belay = setup().await;
    let account = belay
        .register(Registration::new("bonatti", "k2summit1954"))
        .await
        .unwrap();

    let _ = belay
        .login(LoginRequest::new("nobody", "k2summit1954").with_source_ip("198.51.100.1"))
        .await;
    let _ = belay
        .login(LoginRequest::new("bonatti", "wrong-password-1").with_source_ip("198.51.100.2"))
        .await;
    belay
        .login(LoginRequest::new("bonatti", "k2summit1954").with_source_ip("198.51.100.3"))
        .await
        .unwrap();

    // Newest first
    let entries = belay.recent_audit_entries(10).await.unwrap();
    let summary: Vec<_> = entries
        .iter()
        .map(|e| (e.action, e.status, e.source_ip.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (AuditAction::Login, AuditStatus::Success, Some("198.51.100.3")),
            (AuditAction::Login, AuditStatus::Failed, Some("198.51.100.2")),
            (AuditAction::Login, AuditStatus::Failed, Some("198.51.100.1")),
            (AuditAction::AccountCreated, AuditStatus::Success, None),
        ]
    );

    assert_eq!(entries[0].performer_type, PerformerType::Account);
    assert_eq!(entries[0].performer_id, Some(account.id));
    assert_eq!(entries[1].affected_account_id, Some(account.id));
    assert_eq!(entries[2].performer_type, PerformerType::Anonymous);
    assert_eq!(entries[2].affected_account_id, None);
    assert!(!entries[1].detail.contains("wrong-password-1"));

    let for_account = belay.audit_entries_for(account.id, 10).await.unwrap();
    assert_eq!(for_account.len(), 3);
}

#[tokio::test]
async fn test_success_resets_failure_counter() {
    use belay_core::repositories::{AccountRepository, AccountRepositoryProvider};

    let belay = setup().await;
    let account = belay
        .register(Registration::new("bonatti", "k2summit1954"))
        .await
        .unwrap();

    for _ in 0..3 {
        let _ = belay
            .login(LoginRequest::new("bonatti", "wrong-password-1"))
            .await;
    }
    let stored = belay
        .repositories()
        .account()
        .find_by_id(account.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.lockout.failed_login_attempts, 3);

    belay
        .login(LoginRequest::new("bonatti", "k2summit1954"))
        .await
        .unwrap();

    let stored = belay
        .repositories()
        .account()
        .find_by_id(account.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.lockout.failed_login_attempts, 0);
    assert!(stored.lockout.locked_until.is_none());
    assert!(stored.last_login_at.is_some());
}

#[tokio::test]
async fn test_register_rejects_duplicate_and_weak_input() {
    let belay = setup().await;
    belay
        .register(Registration::new("bonatti", "k2summit1954"))
        .await
        .unwrap();

    let err = belay
        .register(Registration::new("bonatti", "dru1955pillar"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::LoginNameTaken)
    ));

    let err = belay
        .register(Registration::new("cassin", "allletters"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::WeakPassword)));
}

#[tokio::test]
async fn test_change_password() {
    let belay = setup().await;
    let account = belay
        .register(Registration::new("bonatti", "k2summit1954"))
        .await
        .unwrap();

    let err = belay
        .change_password(account.id, "not-the-password-1", "dru1955pillar")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));

    belay
        .change_password(account.id, "k2summit1954", "dru1955pillar")
        .await
        .unwrap();

    assert!(
        belay
            .login(LoginRequest::new("bonatti", "k2summit1954"))
            .await
            .is_err()
    );
    belay
        .login(LoginRequest::new("bonatti", "dru1955pillar"))
        .await
        .unwrap();

    let summary = belay.get_account(account.id).await.unwrap().unwrap();
    assert_eq!(summary.login_name, "bonatti");
}
