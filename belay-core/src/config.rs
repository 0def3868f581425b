use std::time::Duration;

use crate::{error::ConfigError, lockout::LockoutConfig, token::TokenConfig};

/// Default delay applied before answering a failed login.
pub const DEFAULT_LOGIN_DELAY: Duration = Duration::from_millis(500);

/// Everything the authentication services need, constructed once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub lockout: LockoutConfig,
    pub tokens: TokenConfig,
    /// Fixed wait before a failed login responds, whatever the cause.
    pub login_delay: Duration,
    /// Issue a new refresh token on every refresh.
    pub rotate_refresh_tokens: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            lockout: LockoutConfig::default(),
            tokens: TokenConfig::default(),
            login_delay: DEFAULT_LOGIN_DELAY,
            rotate_refresh_tokens: true,
        }
    }
}

impl AuthConfig {
    pub fn new(tokens: TokenConfig) -> Self {
        Self {
            tokens,
            ..Self::default()
        }
    }

    pub fn with_lockout(mut self, lockout: LockoutConfig) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn with_tokens(mut self, tokens: TokenConfig) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_login_delay(mut self, login_delay: Duration) -> Self {
        self.login_delay = login_delay;
        self
    }

    pub fn with_refresh_token_rotation(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lockout.validate()?;
        self.tokens.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.login_delay, Duration::from_millis(500));
        assert!(config.rotate_refresh_tokens);
        assert_eq!(config.lockout.max_failed_attempts, 5);
        assert_eq!(config.tokens.access_ttl, chrono::Duration::minutes(15));
    }

    #[test]
    fn test_validate_requires_secret() {
        assert_eq!(
            AuthConfig::default().validate(),
            Err(ConfigError::MissingSecret("access token secret"))
        );
        assert!(
            AuthConfig::new(TokenConfig::new("a-secret-that-is-long-enough-for-hs256"))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let config = AuthConfig::new(TokenConfig::new("a-secret-that-is-long-enough-for-hs256"))
            .with_lockout(LockoutConfig::default().with_max_failed_attempts(0));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
