//! Signed tokens that carry a whole delegation chain
//!
//! A token issued for an [`IdentityChain`] embeds every member identity, so a
//! downstream service can rebuild the chain without repeating the directory
//! lookups. Decoding re-applies authority derivation through the configured
//! [`ChainFactory`]; roles in the token are never trusted as final authorities.
//!
//! **Error mapping** (all terminal, never retried):
//! - malformed or unsupported token → [`AuthError::InvalidToken`]
//! - signature mismatch → [`AuthError::InvalidSignature`]
//! - past expiry → [`AuthError::TokenExpired`]

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use proxied_identity::{AuthError, AuthResult, ChainFactory, Identity, IdentityChain};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub const DEFAULT_VALIDATION_LEEWAY: u64 = 30; // 30 seconds clock skew tolerance
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Claims of a chain token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainClaims {
    /// Subject DN of the primary identity
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID
    pub jti: String,
    /// Chain members in presented order
    #[serde(default)]
    pub users: Vec<Identity>,
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired(err.to_string()),
        ErrorKind::InvalidSignature => AuthError::InvalidSignature(err.to_string()),
        _ => AuthError::InvalidToken(err.to_string()),
    }
}

/// Verifies chain tokens and rebuilds the [`IdentityChain`]
#[derive(Clone)]
pub struct TokenChainDecoder {
    key: DecodingKey,
    validation: Validation,
    factory: ChainFactory,
}

impl TokenChainDecoder {
    /// HS256 shared secret
    pub fn from_secret(secret: &[u8], factory: ChainFactory) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256, factory)
    }

    /// RS256 public key in PEM format
    pub fn from_rsa_pem(public_key_pem: &str, factory: ChainFactory) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .context("Failed to parse RSA public key - invalid PEM format")?;
        Ok(Self::with_key(key, Algorithm::RS256, factory))
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm, factory: ChainFactory) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = DEFAULT_VALIDATION_LEEWAY;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key,
            validation,
            factory,
        }
    }

    pub fn factory(&self) -> &ChainFactory {
        &self.factory
    }

    /// Verify signature, structure and expiry, returning the raw claims
    pub fn decode_claims(&self, token: &str) -> AuthResult<ChainClaims> {
        decode::<ChainClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let err = map_jwt_error(e);
                warn!(kind = err.kind(), "chain token rejected: {}", err);
                err
            })
    }

    /// Decode a token into an identity chain with freshly derived authorities
    pub fn decode(&self, token: &str) -> AuthResult<IdentityChain> {
        let claims = self.decode_claims(token)?;
        if claims.users.is_empty() {
            warn!(sub = %claims.sub, "chain token carries no identities");
            return Err(AuthError::InvalidToken(
                "token carries no identities".to_string(),
            ));
        }

        let creation_time = claims.users.iter().map(Identity::creation_time).min();
        let chain = self.factory.create(claims.users, creation_time)?;

        debug!(user = %chain.username(), jti = %claims.jti, "chain token accepted");
        Ok(chain)
    }
}

/// Issues chain tokens
pub struct ChainTokenIssuer {
    key: EncodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl ChainTokenIssuer {
    /// HS256 shared secret
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    /// RS256 private key in PEM format
    pub fn from_rsa_pem(private_key_pem: &str) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .context("Failed to parse RSA private key - invalid PEM format")?;
        Ok(Self {
            key,
            algorithm: Algorithm::RS256,
            ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Encode every member of `chain`, in presented order
    pub fn issue(&self, chain: &IdentityChain) -> Result<String> {
        let now = Utc::now();
        let claims = ChainClaims {
            sub: chain.primary().dn().subject_dn().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            users: chain.members().to_vec(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.key)
            .context("Failed to encode chain token")?;

        info!(
            user = %chain.username(),
            jti = %claims.jti,
            "chain token issued"
        );
        Ok(token)
    }
}
