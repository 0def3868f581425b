use thiserror::Error;

/// Message returned to clients for every pre-authentication failure.
///
/// Unknown login names and wrong passwords must be indistinguishable.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid login name or password";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown login name or wrong password. Both causes share this variant.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked, retry in {retry_after_seconds} seconds")]
    AccountLocked { retry_after_seconds: i64 },

    #[error("Insufficient privileges")]
    InsufficientPrivileges,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid login name: {0}")]
    InvalidLoginName(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Weak password")]
    WeakPassword,

    #[error("Login name already taken")]
    LoginNameTaken,

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("JWT signing failed: {0}")]
    JwtSigning(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl Error {
    /// Pre-authentication and token failures the HTTP layer maps to "unauthorized".
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Error::Auth(AuthError::InvalidCredentials) | Error::Token(_)
        )
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Error::Auth(AuthError::AccountLocked { .. }))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::NotFound))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Generic text safe to return to a client.
    ///
    /// Internal details (storage messages, token decode reasons) never leak
    /// through this method; they belong in the operational log.
    pub fn client_message(&self) -> String {
        match self {
            Error::Auth(AuthError::InvalidCredentials) => INVALID_CREDENTIALS_MESSAGE.to_string(),
            Error::Auth(AuthError::AccountLocked {
                retry_after_seconds,
            }) => format!(
                "Account temporarily locked, try again in {} minutes",
                (retry_after_seconds + 59) / 60
            ),
            Error::Auth(AuthError::InsufficientPrivileges) => "Forbidden".to_string(),
            Error::Token(_) => "Unauthorized".to_string(),
            Error::Storage(StorageError::NotFound) => "Not found".to_string(),
            Error::Validation(e) => e.to_string(),
            Error::Storage(_) | Error::Config(_) | Error::Crypto(_) => {
                "Internal server error".to_string()
            }
        }
    }
}
