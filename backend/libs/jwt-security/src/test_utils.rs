//! Test utilities for chain token testing
//!
//! HS256 fixtures shared by the token, client and middleware tests.
//! Never use these keys outside tests.

use proxied_identity::ChainFactory;

use crate::{ChainTokenIssuer, TokenChainDecoder};

pub const TEST_SECRET: &[u8] = b"nova-test-only-chain-token-secret-32b+";

/// Decoder with the default required roles
pub fn test_decoder() -> TokenChainDecoder {
    TokenChainDecoder::from_secret(TEST_SECRET, ChainFactory::default())
}

pub fn test_issuer() -> ChainTokenIssuer {
    ChainTokenIssuer::from_secret(TEST_SECRET)
}
