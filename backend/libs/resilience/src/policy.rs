/// Per-operation call policy: fixed-delay retry bounded by one overall deadline
use std::future::Future;
use std::time::Duration;

use crate::retry::{with_retry_if, RetryConfig, RetryError};
use crate::timeout::{with_timeout_result, TimeoutConfig, TimeoutError};

/// Retry and deadline settings for one remote operation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallPolicy {
    /// Bounds the whole call, retries and delays included
    pub timeout: TimeoutConfig,
    pub retry: RetryConfig,
}

impl CallPolicy {
    pub fn new(timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            timeout: TimeoutConfig { duration: timeout },
            retry: RetryConfig::new(max_retries, retry_delay),
        }
    }

    /// Run `f` with retries for errors accepted by `is_retryable`, all under the deadline
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        f: F,
        is_retryable: P,
    ) -> Result<T, TimeoutError<RetryError<E>>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        with_timeout_result(
            self.timeout.duration,
            with_retry_if(&self.retry, f, is_retryable),
        )
        .await
    }
}

/// Remote authorization calls
///
/// - Timeout: 30s for the whole operation
/// - Retry: 5 retries, 2s apart
pub fn federated_authorization_policy() -> CallPolicy {
    CallPolicy::new(Duration::from_secs(30), 5, Duration::from_secs(2))
}
