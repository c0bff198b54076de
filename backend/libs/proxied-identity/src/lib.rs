//! # Proxied Identity
//!
//! Identity model for requests that reach a service through a chain of
//! cooperating servers acting on behalf of an end user.
//!
//! ## Flow
//! 1. [`CredentialExtractor`] reads the caller (client certificate or trusted
//!    headers) and the `X-ProxiedEntitiesChain`/`X-ProxiedIssuersChain` headers
//! 2. An [`IdentityDirectory`] turns the presented DN pairs into [`Identity`] values
//! 3. [`ChainFactory`] builds the [`IdentityChain`] and derives its authorities
//! 4. A [`GateChain`] applies the allowed-caller and denied-role checks
//!
//! ```rust
//! use proxied_identity::{ChainFactory, Identity, IdentityType, SubjectIssuerDnPair};
//!
//! let proxy = Identity::new(
//!     SubjectIssuerDnPair::new("cn=gateway,o=nova", "cn=nova ca"),
//!     IdentityType::Server,
//!     ["AuthorizedServer"],
//!     Vec::<String>::new(),
//!     0,
//! );
//! let user = Identity::new(
//!     SubjectIssuerDnPair::new("cn=alice,o=nova", "cn=nova ca"),
//!     IdentityType::User,
//!     ["AuthorizedUser", "Analyst"],
//!     ["PUBLIC"],
//!     0,
//! );
//!
//! let chain = ChainFactory::default().create(vec![user, proxy], None).unwrap();
//! assert_eq!(chain.username(), "alice -> gateway");
//! assert!(chain.has_authority("Analyst"));
//! assert!(!chain.has_authority("AuthorizedUser"));
//! ```

pub mod cert;
pub mod chain;
pub mod directory;
pub mod dn;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod model;
pub mod settings;

pub use cert::{pair_from_der, pair_from_pem, PeerCertificate};
pub use chain::{
    canonical_order, derive_authorities, find_primary, primary_position, ChainFactory,
    IdentityChain, DEFAULT_REQUIRED_ROLES,
};
pub use directory::{IdentityDirectory, InMemoryDirectory};
pub use dn::{build_proxied_dn, is_server_dn, normalize_dn, short_name, split_proxied_dns, SubjectIssuerDnPair};
pub use error::{AuthError, AuthResult};
pub use extractor::{
    CredentialExtractor, ExtractedCredentials, ExtractorConfig, InboundCredentials,
    ENTITIES_HEADER, ISSUERS_HEADER, ISSUER_DN_HEADER, SUBJECT_DN_HEADER,
};
pub use gate::{AllowedCallerGate, DeniedRoleGate, Gate, GateChain, GateStage, RequestContext};
pub use model::{Identity, IdentityType};
pub use settings::SecuritySettings;
