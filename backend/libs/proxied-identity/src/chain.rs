//! Delegation chains: primary selection, canonical ordering and authority derivation
//!
//! A chain is the ordered list of principals a request passed through, initial
//! caller first and the final connecting server last. The *primary* identity is
//! the first `USER` anywhere in the chain, or the first element when the chain is
//! purely server-to-server. Every derived view (username, DN list, per-member
//! auths) is produced in canonical order: the primary, then the remaining
//! members in their original relative order. Duplicates are never removed.

use chrono::Utc;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use crate::dn::SubjectIssuerDnPair;
use crate::error::{AuthError, AuthResult};
use crate::model::{Identity, IdentityType};

/// Roles whose presence on every hop marks a chain as fully vetted
pub const DEFAULT_REQUIRED_ROLES: [&str; 3] =
    ["AuthorizedUser", "AuthorizedServer", "AuthorizedQueryServer"];

/// Position of the primary identity, `None` for an empty slice
pub fn primary_position(members: &[Identity]) -> Option<usize> {
    if members.is_empty() {
        return None;
    }
    Some(members.iter().position(Identity::is_user).unwrap_or(0))
}

/// First `USER` in the chain, else the first element
pub fn find_primary(members: &[Identity]) -> Option<&Identity> {
    primary_position(members).map(|p| &members[p])
}

fn canonical_indices(len: usize, primary: usize) -> impl Iterator<Item = usize> {
    std::iter::once(primary)
        .chain(0..primary)
        .chain(primary + 1..len)
}

/// Primary first, then everything else in original order
pub fn canonical_order(members: &[Identity]) -> Vec<Identity> {
    match primary_position(members) {
        Some(p) => canonical_indices(members.len(), p)
            .map(|i| members[i].clone())
            .collect(),
        None => Vec::new(),
    }
}

/// Effective authorities of a chain.
///
/// Starts from the primary's roles. When any member holds none of
/// `required_roles` the chain is incomplete and the roles are returned as-is, so
/// checks that demand a required role still see it. Otherwise the required roles
/// are stripped.
pub fn derive_authorities(
    members: &[Identity],
    required_roles: &BTreeSet<String>,
) -> AuthResult<BTreeSet<String>> {
    let primary = find_primary(members).ok_or(AuthError::EmptyChain)?;
    let incomplete = members
        .iter()
        .any(|member| member.roles().is_disjoint(required_roles));

    Ok(primary
        .roles()
        .iter()
        .filter(|role| incomplete || !required_roles.contains(*role))
        .cloned()
        .collect())
}

/// Ordered, immutable delegation chain with its derived authorities
#[derive(Debug, Clone)]
pub struct IdentityChain {
    members: Vec<Identity>,
    primary: usize,
    authorities: BTreeSet<String>,
    creation_time: i64,
}

impl IdentityChain {
    fn new(
        members: Vec<Identity>,
        authorities: BTreeSet<String>,
        creation_time: i64,
    ) -> AuthResult<Self> {
        let primary = primary_position(&members).ok_or(AuthError::EmptyChain)?;
        Ok(Self {
            members,
            primary,
            authorities,
            creation_time,
        })
    }

    /// Members in the order they were presented
    pub fn members(&self) -> &[Identity] {
        &self.members
    }

    pub fn primary(&self) -> &Identity {
        &self.members[self.primary]
    }

    /// Members in canonical order
    pub fn canonical(&self) -> impl Iterator<Item = &Identity> + '_ {
        canonical_indices(self.members.len(), self.primary).map(move |i| &self.members[i])
    }

    /// Short names in canonical order, joined by ` -> `
    pub fn username(&self) -> String {
        self.canonical()
            .map(Identity::name)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn dns(&self) -> Vec<&SubjectIssuerDnPair> {
        self.canonical().map(Identity::dn).collect()
    }

    pub fn subject_dns(&self) -> Vec<&str> {
        self.canonical().map(|m| m.dn().subject_dn()).collect()
    }

    pub fn issuer_dns(&self) -> Vec<&str> {
        self.canonical().map(|m| m.dn().issuer_dn()).collect()
    }

    /// One auth set per member, canonical order
    pub fn auths_per_member(&self) -> Vec<&BTreeSet<String>> {
        self.canonical().map(Identity::auths).collect()
    }

    /// Subject DNs of the servers that proxied for the primary, `None` when there are none
    pub fn proxy_servers(&self) -> Option<Vec<&str>> {
        let primary = self.primary();
        let servers: Vec<&str> = self
            .canonical()
            .filter(|m| m.user_type() == IdentityType::Server && *m != primary)
            .map(|m| m.dn().subject_dn())
            .collect();
        (!servers.is_empty()).then_some(servers)
    }

    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    pub fn has_authority(&self, role: &str) -> bool {
        self.authorities.contains(role)
    }

    /// Whether the primary holds any of the manager roles
    pub fn is_manager<S: AsRef<str>>(&self, manager_roles: &[S]) -> bool {
        manager_roles
            .iter()
            .any(|role| self.primary().roles().contains(role.as_ref()))
    }

    /// Epoch millis
    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    /// New chain whose members carry auths computed by `auths_for`.
    ///
    /// Roles are untouched, so authorities and creation time carry over.
    pub fn with_member_auths<F>(&self, mut auths_for: F) -> Self
    where
        F: FnMut(&Identity) -> BTreeSet<String>,
    {
        let members = self
            .members
            .iter()
            .map(|m| m.with_auths(auths_for(m)))
            .collect();
        Self {
            members,
            primary: self.primary,
            authorities: self.authorities.clone(),
            creation_time: self.creation_time,
        }
    }
}

impl PartialEq for IdentityChain {
    fn eq(&self, other: &Self) -> bool {
        self.username() == other.username() && self.members == other.members
    }
}

impl Eq for IdentityChain {}

impl Hash for IdentityChain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username().hash(state);
        self.members.hash(state);
    }
}

/// Builds chains and applies authority derivation
#[derive(Debug, Clone)]
pub struct ChainFactory {
    required_roles: BTreeSet<String>,
}

impl Default for ChainFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_ROLES)
    }
}

impl ChainFactory {
    pub fn new<I>(required_roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            required_roles: required_roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required_roles(&self) -> &BTreeSet<String> {
        &self.required_roles
    }

    /// Build a chain. Creation time defaults to the earliest member creation time.
    pub fn create(
        &self,
        members: Vec<Identity>,
        creation_time: Option<i64>,
    ) -> AuthResult<IdentityChain> {
        let authorities = derive_authorities(&members, &self.required_roles)?;
        let creation_time = creation_time
            .or_else(|| members.iter().map(Identity::creation_time).min())
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        IdentityChain::new(members, authorities, creation_time)
    }

    /// New chain with `hop` appended as the latest connecting principal
    pub fn append(&self, chain: &IdentityChain, hop: Identity) -> AuthResult<IdentityChain> {
        let mut members = chain.members.clone();
        members.push(hop);
        self.create(members, None)
    }
}
