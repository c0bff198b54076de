//! Failures of calls to a remote authorization service

use resilience::{RetryError, TimeoutError};
use std::time::Duration;
use thiserror::Error;

use crate::model::Operation;

/// Why a single remote operation did not produce a usable response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FederationFailure {
    /// 4xx from the remote authority; never retried
    #[error("Remote authority rejected the request (status {status})")]
    ClientError { status: u16 },

    /// 5xx from the remote authority; retried per policy
    #[error("Remote authority error (status {status})")]
    ServerError { status: u16 },

    #[error("Remote authority unavailable after {attempts} attempts")]
    ServiceUnavailable {
        attempts: u32,
        last_status: Option<u16>,
    },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, reset, TLS failure and similar
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response exceeded {limit} bytes")]
    ResponseTooLarge { limit: u64 },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl FederationFailure {
    /// Server errors and transport failures are transient
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerError { .. } | Self::Transport(_))
    }

    /// Remote status that caused this failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientError { status } | Self::ServerError { status } => Some(*status),
            Self::ServiceUnavailable { last_status, .. } => *last_status,
            _ => None,
        }
    }
}

impl From<TimeoutError<RetryError<FederationFailure>>> for FederationFailure {
    fn from(err: TimeoutError<RetryError<FederationFailure>>) -> Self {
        match err {
            TimeoutError::Elapsed(duration) => Self::Timeout(duration),
            TimeoutError::OperationFailed(RetryError::OperationFailed(cause)) => cause,
            TimeoutError::OperationFailed(RetryError::MaxRetriesExceeded { retries, last }) => {
                Self::ServiceUnavailable {
                    attempts: retries.saturating_add(1),
                    last_status: last.status(),
                }
            }
        }
    }
}

/// A remote operation failed on behalf of `principal`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed for {principal}: {cause}")]
pub struct AuthorizationError {
    /// Primary identity of the chain the call was made for
    pub principal: String,
    pub operation: Operation,
    #[source]
    pub cause: FederationFailure,
}

impl AuthorizationError {
    pub fn status(&self) -> Option<u16> {
        self.cause.status()
    }
}

pub type Result<T, E = AuthorizationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FederationFailure::ServerError { status: 503 }.is_retryable());
        assert!(FederationFailure::Transport("connection reset".into()).is_retryable());
        assert!(!FederationFailure::ClientError { status: 404 }.is_retryable());
        assert!(!FederationFailure::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!FederationFailure::ResponseTooLarge { limit: 10 }.is_retryable());
    }

    #[test]
    fn test_exhaustion_becomes_service_unavailable() {
        let err = TimeoutError::OperationFailed(RetryError::MaxRetriesExceeded {
            retries: 2,
            last: FederationFailure::ServerError { status: 503 },
        });

        assert_eq!(
            FederationFailure::from(err),
            FederationFailure::ServiceUnavailable {
                attempts: 3,
                last_status: Some(503)
            }
        );
    }

    #[test]
    fn test_terminal_failure_passes_through() {
        let err = TimeoutError::OperationFailed(RetryError::OperationFailed(
            FederationFailure::ClientError { status: 403 },
        ));
        assert_eq!(
            FederationFailure::from(err).status(),
            Some(403)
        );
    }

    #[test]
    fn test_error_names_principal() {
        let err = AuthorizationError {
            principal: "alice".into(),
            operation: Operation::ListEffectiveAuthorizations,
            cause: FederationFailure::Timeout(Duration::from_millis(500)),
        };
        let message = err.to_string();
        assert!(message.contains("alice"));
        assert!(message.contains("listEffectiveAuthorizations"));
    }
}
