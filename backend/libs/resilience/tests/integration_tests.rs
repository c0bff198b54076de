/// Integration tests for resilience library
use resilience::{
    policy::CallPolicy,
    retry::{with_retry_if, RetryConfig, RetryError},
    timeout::TimeoutError,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulated remote status codes, one per attempt
fn scripted(statuses: Vec<u16>) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<&'static str, u16>>) {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let f = move || {
        let n = calls_clone.fetch_add(1, Ordering::SeqCst) as usize;
        let status = statuses.get(n).copied().unwrap_or(200);
        std::future::ready(if status == 200 { Ok("body") } else { Err(status) })
    };
    (calls, f)
}

fn server_error(status: &u16) -> bool {
    *status >= 500
}

// ==================== Retry Tests ====================

#[tokio::test]
async fn test_two_503_then_200_succeeds() {
    let (calls, f) = scripted(vec![503, 503, 200]);
    let config = RetryConfig::new(2, Duration::from_millis(5));

    let result = with_retry_if(&config, f, server_error).await;

    assert_eq!(result.unwrap(), "body");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_503_until_budget_exhausted() {
    let (calls, f) = scripted(vec![503; 10]);
    let config = RetryConfig::new(3, Duration::from_millis(5));

    let result = with_retry_if(&config, f, server_error).await;

    assert!(matches!(
        result,
        Err(RetryError::MaxRetriesExceeded { retries: 3, last: 503 })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_404_never_retried() {
    let (calls, f) = scripted(vec![404, 200]);
    let config = RetryConfig::new(5, Duration::from_millis(5));

    let result = with_retry_if(&config, f, server_error).await;

    assert!(matches!(result, Err(RetryError::OperationFailed(404))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ==================== Policy Tests ====================

#[tokio::test]
async fn test_policy_recovers_within_deadline() {
    let (calls, f) = scripted(vec![502, 200]);
    let policy = CallPolicy::new(Duration::from_secs(2), 3, Duration::from_millis(5));

    let result = policy.execute(f, server_error).await;

    assert_eq!(result.unwrap(), "body");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_policy_slow_operation_times_out() {
    let policy = CallPolicy::new(Duration::from_millis(20), 0, Duration::ZERO);

    let result = policy
        .execute(
            || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, u16>("late")
            },
            server_error,
        )
        .await;

    assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
}
