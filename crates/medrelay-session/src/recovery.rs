//! Session recovery
//!
//! Bounded retry for authentication and session operations. The operation is
//! invoked at most `max_attempts` times with a fixed sleep between attempts;
//! a non-transient failure ends the loop immediately. Sleeps go through the
//! injected clock so tests observe them without waiting.

use crate::retry::{RetryPolicy, Transient};
use medrelay_core::PhysicalClock;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Retries transient session failures with a fixed backoff
pub struct SessionRecoveryManager<C> {
    policy: RetryPolicy,
    clock: Arc<C>,
}

impl<C> Clone for SessionRecoveryManager<C> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: PhysicalClock> SessionRecoveryManager<C> {
    pub fn new(policy: RetryPolicy, clock: Arc<C>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `operation` until it succeeds, fails non-transiently, or the
    /// attempt budget is spent. Returns the last error in the latter cases.
    pub async fn with_retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "session operation recovered");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_transient() => {
                    debug!(attempt, error = %error, "session operation failed permanently");
                    return Err(error);
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %error, "session operation gave up");
                    return Err(error);
                }
                Err(error) => {
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = self.policy.backoff.as_millis() as u64,
                        error = %error,
                        "session operation failed; retrying"
                    );
                    self.clock.sleep(self.policy.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
