//! # Federated Authorization
//!
//! Asks remote authorization services for the effective authorizations of an
//! [`proxied_identity::IdentityChain`].
//!
//! - [`FederatedAuthorizationClient`]: one remote service, with per-operation
//!   retry and timeout and a local response cache
//! - [`FederatedAuthorizationRegistry`]: named clients built from [`RegistrySettings`]
//! - [`ServerIdentitySupplier`]: this service's own chain, refreshed daily
//!
//! ```rust,no_run
//! use federated_authz::{FederatedAuthorizationRegistry, RegistrySettings};
//!
//! # async fn run(chain: proxied_identity::IdentityChain) -> anyhow::Result<()> {
//! let settings = RegistrySettings::load(None)?;
//! let registry = FederatedAuthorizationRegistry::from_settings(&settings)?;
//!
//! if let Some(remote) = registry.get("remote") {
//!     let auths = remote.list_effective_authorizations(&chain, true).await?;
//!     println!("{:?}", auths.effective_auths());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod model;
pub mod registry;
pub mod server_identity;
pub mod settings;

pub use cache::{AuthorizationCache, CacheKey, CachedResponse, MokaAuthorizationCache};
pub use client::FederatedAuthorizationClient;
pub use error::{AuthorizationError, FederationFailure};
pub use model::{Acknowledgement, AuthorizationSet, Operation, UserAuthorizations};
pub use registry::FederatedAuthorizationRegistry;
pub use server_identity::{ServerIdentityError, ServerIdentitySupplier};
pub use settings::{
    CacheSettings, FederationSettings, OperationSettings, RegistrySettings, ServerIdentitySettings,
};
