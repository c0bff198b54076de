/// Resilience patterns for remote calls
///
/// - **Retry**: fixed delay between attempts, with a classifier deciding which errors are transient
/// - **Timeout**: one deadline over a whole operation
/// - **Call policy**: both combined, configured per remote operation
///
/// # Example: Remote call with retry under a deadline
///
/// ```rust,no_run
/// use resilience::policy::federated_authorization_policy;
///
/// #[tokio::main]
/// async fn main() {
///     let policy = federated_authorization_policy();
///
///     let result = policy
///         .execute(
///             || async {
///                 // Your HTTP call here, returning a status on failure
///                 Err::<(), u16>(503)
///             },
///             |status| *status >= 500,
///         )
///         .await;
/// }
/// ```

pub mod policy;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use policy::{federated_authorization_policy, CallPolicy};
pub use retry::{with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout_result, TimeoutConfig, TimeoutError};
