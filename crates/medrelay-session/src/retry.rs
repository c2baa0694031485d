//! Retry policy and failure classification

use medrelay_core::{AuthError, LedgerError, MedRelayError, SessionConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether another attempt of the failed operation may succeed
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for AuthError {
    fn is_transient(&self) -> bool {
        AuthError::is_transient(self)
    }
}

impl Transient for MedRelayError {
    fn is_transient(&self) -> bool {
        MedRelayError::is_transient(self)
    }
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable { .. })
    }
}

/// Fixed-backoff retry bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total invocations, including the first
    pub max_attempts: u32,
    /// Delay between consecutive attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Three attempts, `backoff` apart
    pub fn fixed(backoff: Duration) -> Self {
        Self {
            max_attempts: 3,
            backoff,
        }
    }

    /// Single attempt, no sleeping
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Invocations actually made; a zero bound still runs the operation once
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl From<&SessionConfig> for RetryPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_session_config() {
        let from_config = RetryPolicy::from(&SessionConfig::default());
        assert_eq!(from_config, RetryPolicy::default());
        assert_eq!(from_config.attempts(), 3);
        assert_eq!(from_config.backoff, Duration::from_secs(1));
        assert_eq!(RetryPolicy::no_retry().with_max_attempts(0).attempts(), 1);
    }

    #[test]
    fn only_transient_failures_classify_as_retryable() {
        assert!(AuthError::transient("timeout").is_transient());
        assert!(!Transient::is_transient(&AuthError::rejected("bad password")));
        assert!(Transient::is_transient(&LedgerError::unavailable("down")));
        assert!(!Transient::is_transient(&LedgerError::Unconfigured));
        assert!(!Transient::is_transient(&MedRelayError::validation("empty email")));
    }
}
