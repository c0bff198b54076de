//! Authentication failures raised while building an identity chain

use thiserror::Error;

/// Result alias used throughout the identity core
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Terminal authentication failures. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed, missing or mismatched proxy headers, disallowed caller, denied role
    #[error("Invalid credentials: {0}")]
    CredentialsInvalid(String),

    /// Token could not be parsed or uses an unsupported structure
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token signature did not verify
    #[error("Invalid token signature: {0}")]
    InvalidSignature(String),

    /// Token is past its expiry
    #[error("Token expired: {0}")]
    TokenExpired(String),

    /// A chain was requested from zero identities
    #[error("Identity chain must contain at least one identity")]
    EmptyChain,

    /// The directory has no entry for a presented DN
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),
}

impl AuthError {
    /// HTTP status used when this failure is surfaced to a caller
    pub fn status_code(&self) -> u16 {
        match self {
            Self::CredentialsInvalid(_) => 403,
            Self::InvalidToken(_) => 401,
            Self::InvalidSignature(_) => 401,
            Self::TokenExpired(_) => 401,
            Self::EmptyChain => 401,
            Self::UnknownIdentity(_) => 401,
        }
    }

    /// Short machine-readable tag for error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CredentialsInvalid(_) => "credentials_invalid",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::TokenExpired(_) => "token_expired",
            Self::EmptyChain => "empty_chain",
            Self::UnknownIdentity(_) => "unknown_identity",
        }
    }

    pub(crate) fn credentials(message: impl Into<String>) -> Self {
        Self::CredentialsInvalid(message.into())
    }
}
