//! # Actix Middleware Library
//!
//! Proxied entity authentication for Nova Actix services
//!
//! ## Modules
//! - `proxied_auth`: certificate, trusted-header and bearer-token authentication
//!   producing an [`proxied_identity::IdentityChain`] per request
//! - `error`: JSON rejection responses

pub mod error;
pub mod proxied_auth;

pub use error::{AuthRejection, ErrorBody};
pub use proxied_auth::{AuthenticatedChain, ProxiedEntityAuth, ProxiedEntityAuthService};
