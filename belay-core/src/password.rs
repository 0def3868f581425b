//! Password hashing
//!
//! Hashes are argon2 PHC strings produced by `password-auth`. Both hashing and
//! verification are deliberately slow, so they run on the blocking pool and
//! never stall the async runtime.

use std::sync::LazyLock;

use crate::{Error, error::CryptoError};

/// Compared against when there is no stored hash, so that path costs one
/// full verification too.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| password_auth::generate_hash("belay-dummy-password-0"));

pub async fn hash_password(password: &str) -> Result<String, Error> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || password_auth::generate_hash(password))
        .await
        .map_err(|e| CryptoError::PasswordHash(e.to_string()).into())
}

/// Returns `Ok(false)` for a wrong password or an unparsable hash.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let verified = tokio::task::spawn_blocking(move || {
        match password_auth::verify_password(password, &hash) {
            Ok(()) => true,
            Err(password_auth::VerifyError::PasswordInvalid) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
        }
    })
    .await
    .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;

    Ok(verified)
}

/// Spend one verification on a password that has no account behind it.
pub async fn verify_dummy_password(password: &str) -> Result<(), Error> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let _ = password_auth::verify_password(password, &DUMMY_HASH);
    })
    .await
    .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;

    Ok(())
}
