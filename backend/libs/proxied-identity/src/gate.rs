//! Request gates: allow-listed callers and denied roles
//!
//! Gates are plain functions over a [`RequestContext`]. A [`GateChain`] runs
//! them in registration order for one stage and stops at the first rejection.

use std::collections::HashSet;
use tracing::warn;

use crate::chain::IdentityChain;
use crate::dn::SubjectIssuerDnPair;
use crate::error::{AuthError, AuthResult};
use crate::settings::SecuritySettings;

/// When a gate runs relative to authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    /// Before any chain is built; only transport credentials are known
    PreAuthentication,
    /// After the chain and its authorities exist, before business logic
    PostAuthentication,
}

/// What a gate can see about the current request
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext<'a> {
    pub certificate: Option<&'a SubjectIssuerDnPair>,
    pub chain: Option<&'a IdentityChain>,
}

pub trait Gate: Send + Sync {
    fn name(&self) -> &'static str;

    fn stage(&self) -> GateStage;

    /// `Ok(())` continues, `Err` rejects the request
    fn check(&self, ctx: &RequestContext<'_>) -> AuthResult<()>;
}

/// Rejects certificate callers that are not on the allow-list
#[derive(Debug, Clone)]
pub struct AllowedCallerGate {
    enforce: bool,
    allowed: HashSet<SubjectIssuerDnPair>,
}

impl AllowedCallerGate {
    pub fn new<I>(enforce: bool, allowed: I) -> Self
    where
        I: IntoIterator<Item = SubjectIssuerDnPair>,
    {
        Self {
            enforce,
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Build from `subject<issuer>` strings
    pub fn from_strings<I, S>(enforce: bool, allowed: I) -> AuthResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|entry| entry.as_ref().parse::<SubjectIssuerDnPair>())
            .collect::<AuthResult<HashSet<_>>>()?;
        Ok(Self { enforce, allowed })
    }
}

impl Gate for AllowedCallerGate {
    fn name(&self) -> &'static str {
        "allowed-callers"
    }

    fn stage(&self) -> GateStage {
        GateStage::PreAuthentication
    }

    fn check(&self, ctx: &RequestContext<'_>) -> AuthResult<()> {
        let Some(certificate) = ctx.certificate else {
            return Ok(());
        };
        if !self.enforce || self.allowed.contains(certificate) {
            return Ok(());
        }
        warn!(caller = %certificate, "caller is not on the allowed callers list");
        Err(AuthError::credentials(format!(
            "{} is not an allowed caller",
            certificate
        )))
    }
}

/// Rejects principals whose authorities contain the deny role
#[derive(Debug, Clone)]
pub struct DeniedRoleGate {
    role: Option<String>,
}

impl DeniedRoleGate {
    pub fn new(role: Option<String>) -> Self {
        Self {
            role: role.filter(|r| !r.trim().is_empty()),
        }
    }
}

impl Gate for DeniedRoleGate {
    fn name(&self) -> &'static str {
        "denied-access-role"
    }

    fn stage(&self) -> GateStage {
        GateStage::PostAuthentication
    }

    fn check(&self, ctx: &RequestContext<'_>) -> AuthResult<()> {
        let (Some(role), Some(chain)) = (self.role.as_deref(), ctx.chain) else {
            return Ok(());
        };
        if !chain.has_authority(role) {
            return Ok(());
        }
        let name = chain.username();
        warn!(user = %name, role = %role, "principal holds the denied access role");
        Err(AuthError::credentials(format!("{} is not authorized", name)))
    }
}

/// Ordered gate dispatcher
#[derive(Default)]
pub struct GateChain {
    gates: Vec<Box<dyn Gate>>,
}

impl GateChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate<G: Gate + 'static>(mut self, gate: G) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    /// Allow-list then deny-role, configured from settings
    pub fn from_settings(settings: &SecuritySettings) -> AuthResult<Self> {
        Ok(Self::new()
            .with_gate(AllowedCallerGate::from_strings(
                settings.enforce_allowed_callers,
                &settings.allowed_callers,
            )?)
            .with_gate(DeniedRoleGate::new(settings.denied_access_role.clone())))
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Run every gate registered for `stage`, stopping at the first rejection
    pub fn run(&self, stage: GateStage, ctx: &RequestContext<'_>) -> AuthResult<()> {
        self.gates
            .iter()
            .filter(|gate| gate.stage() == stage)
            .try_for_each(|gate| gate.check(ctx))
    }
}
