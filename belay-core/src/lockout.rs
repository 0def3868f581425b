//! Account lockout policy.
//!
//! The policy is pure: it maps an account's failure history and the current
//! time to a decision, and computes the state a failure or success produces.
//! Storage backends apply a [`FailureUpdate`] atomically so that concurrent
//! wrong-password submissions against the same account are all counted.
//!
//! # Example
//!
//! ```rust
//! use belay_core::lockout::{LockoutConfig, LockoutDecision, LockoutPolicy};
//! use belay_core::account::{LockoutState, Role};
//! use chrono::Utc;
//!
//! let policy = LockoutPolicy::new(LockoutConfig::default());
//! let decision = policy.evaluate(Role::Member, &LockoutState::default(), Utc::now());
//! assert_eq!(decision, LockoutDecision::Allowed);
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::{
    account::{Account, LockoutState, Role},
    error::ConfigError,
};

/// Thresholds for automatic account lockout.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// When disabled, failures are still counted but never lock an account.
    pub enabled: bool,
    /// Failures within the reset window that trigger a lock.
    pub max_failed_attempts: u32,
    /// How long a lock lasts.
    pub lockout_duration: Duration,
    /// A failure older than this no longer counts toward the threshold.
    pub reset_window: Duration,
    /// Admins and superusers are never locked when set.
    pub exempt_administrators: bool,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 5,
            lockout_duration: Duration::minutes(30),
            reset_window: Duration::minutes(120),
            exempt_administrators: true,
        }
    }
}

impl LockoutConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.max_failed_attempts = max_failed_attempts;
        self
    }

    pub fn with_lockout_duration(mut self, lockout_duration: Duration) -> Self {
        self.lockout_duration = lockout_duration;
        self
    }

    pub fn with_reset_window(mut self, reset_window: Duration) -> Self {
        self.reset_window = reset_window;
        self
    }

    pub fn with_exempt_administrators(mut self, exempt: bool) -> Self {
        self.exempt_administrators = exempt;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failed_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_failed_attempts must be at least 1".to_string(),
            ));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(ConfigError::Invalid(
                "lockout_duration must be positive".to_string(),
            ));
        }
        if self.reset_window <= Duration::zero() {
            return Err(ConfigError::Invalid(
                "reset_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of checking an account before its password is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutDecision {
    Allowed,
    Locked { until: DateTime<Utc> },
}

impl LockoutDecision {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockoutDecision::Locked { .. })
    }

    /// Whole seconds until the lock lifts, rounded up. `None` when allowed.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            LockoutDecision::Allowed => None,
            LockoutDecision::Locked { until } => {
                let remaining = (*until - now).num_milliseconds();
                Some(((remaining + 999) / 1000).max(0))
            }
        }
    }
}

/// The failure rule for one account at one instant.
///
/// [`FailureUpdate::apply`] is the reference semantics; storage backends
/// express the same rule as a single conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureUpdate {
    /// Time of the failed attempt.
    pub now: DateTime<Utc>,
    /// A previous failure before this instant no longer counts.
    pub reset_before: DateTime<Utc>,
    /// Counter value at which the account locks.
    pub max_failed_attempts: u32,
    /// Lock expiry to set once the threshold is reached, or `None` when this
    /// account can never be locked.
    pub lock_until: Option<DateTime<Utc>>,
}

impl FailureUpdate {
    /// Whether the stored counter is stale and the failure starts a new count.
    ///
    /// Only the reset window decides; an elapsed lock keeps its count, so the
    /// next failure inside the window locks again.
    pub fn starts_fresh(&self, state: &LockoutState) -> bool {
        state
            .last_failed_login
            .is_none_or(|last| last < self.reset_before)
    }

    pub fn apply(&self, state: &LockoutState) -> LockoutState {
        let previous = if self.starts_fresh(state) {
            0
        } else {
            state.failed_login_attempts
        };
        let failed_login_attempts = previous.saturating_add(1);

        let locked_until = match self.lock_until {
            Some(until) if failed_login_attempts >= self.max_failed_attempts => Some(until),
            _ => None,
        };

        LockoutState {
            failed_login_attempts,
            last_failed_login: Some(self.now),
            locked_until,
        }
    }
}

/// Decision logic mapping failure history to allow/deny outcomes.
#[derive(Debug, Clone, Default)]
pub struct LockoutPolicy {
    config: LockoutConfig,
}

impl LockoutPolicy {
    pub fn new(config: LockoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Whether accounts with this role can be automatically locked.
    pub fn can_lock(&self, role: Role) -> bool {
        self.config.enabled && !(self.config.exempt_administrators && role.is_administrator())
    }

    /// Decide whether a login attempt may proceed to password comparison.
    ///
    /// Only an active `locked_until` denies an attempt; a high counter on its
    /// own does not, since the lock is always set by the failure that reached
    /// the threshold.
    pub fn evaluate(&self, role: Role, state: &LockoutState, now: DateTime<Utc>) -> LockoutDecision {
        if !self.can_lock(role) {
            return LockoutDecision::Allowed;
        }

        match state.locked_until {
            Some(until) if now < until => LockoutDecision::Locked { until },
            _ => LockoutDecision::Allowed,
        }
    }

    pub fn evaluate_account(&self, account: &Account, now: DateTime<Utc>) -> LockoutDecision {
        self.evaluate(account.role, &account.lockout, now)
    }

    pub fn failure_update(&self, role: Role, now: DateTime<Utc>) -> FailureUpdate {
        FailureUpdate {
            now,
            reset_before: now - self.config.reset_window,
            max_failed_attempts: self.config.max_failed_attempts,
            lock_until: self
                .can_lock(role)
                .then(|| now + self.config.lockout_duration),
        }
    }

    /// State after a failed attempt at `now`.
    pub fn record_failure(&self, account: &Account, now: DateTime<Utc>) -> LockoutState {
        self.failure_update(account.role, now)
            .apply(&account.lockout)
    }

    /// State after a successful login. Idempotent.
    pub fn record_success(&self, _account: &Account) -> LockoutState {
        LockoutState::default()
    }
}
