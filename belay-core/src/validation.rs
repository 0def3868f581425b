use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

/// Letters and digits in any script, with inner spaces, dots, hyphens,
/// underscores and apostrophes, so full names like "Hans Kammerlander" work.
static LOGIN_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N}](?:[\p{L}\p{N} ._'-]*[\p{L}\p{N}.])?$")
        .expect("Invalid login name regex pattern")
});

pub const MIN_LOGIN_NAME_LEN: usize = 3;
pub const MAX_LOGIN_NAME_LEN: usize = 100;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Validates a login name
///
/// # Login Name Requirements
///
/// - Between 3 and 100 characters
/// - Starts with a letter or digit and does not end with a separator
/// - Letters, digits, spaces, `.`, `-`, `_` and `'` only
///
/// # Examples
///
/// ```rust
/// use belay_core::validation::validate_login_name;
///
/// assert!(validate_login_name("Reinhold Messner").is_ok());
/// assert!(validate_login_name("gerlinde.k").is_ok());
/// assert!(validate_login_name(" x").is_err());
/// ```
pub fn validate_login_name(login_name: &str) -> Result<(), ValidationError> {
    if login_name.is_empty() {
        return Err(ValidationError::MissingField(
            "Login name is required".to_string(),
        ));
    }

    let len = login_name.chars().count();
    if len < MIN_LOGIN_NAME_LEN {
        return Err(ValidationError::InvalidLoginName(format!(
            "Login name must be at least {MIN_LOGIN_NAME_LEN} characters long"
        )));
    }
    if len > MAX_LOGIN_NAME_LEN {
        return Err(ValidationError::InvalidLoginName(format!(
            "Login name must be no more than {MAX_LOGIN_NAME_LEN} characters long"
        )));
    }

    if LOGIN_NAME_REGEX.is_match(login_name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidLoginName(
            "Login name contains invalid characters".to_string(),
        ))
    }
}

/// Validates a new password
///
/// # Password Requirements
///
/// - Between 8 and 128 characters
/// - Cannot be whitespace only
/// - Must contain at least one letter and one digit
///
/// Only applied when a password is set. Login never validates the submitted
/// password, it is just compared against the stored hash.
///
/// # Examples
///
/// ```rust
/// use belay_core::validation::validate_password;
///
/// assert!(validate_password("eiger1938").is_ok());
/// assert!(validate_password("weak").is_err());
/// assert!(validate_password("onlyletters").is_err());
/// ```
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be no more than {MAX_PASSWORD_LEN} characters long"
        )));
    }

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(ValidationError::WeakPassword);
    }

    Ok(())
}
