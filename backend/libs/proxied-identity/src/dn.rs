//! Distinguished name handling
//!
//! DNs are compared in a normalized form: lower-case, one comma between RDNs,
//! no whitespace around separators. Escaped commas (`\,`) stay inside their RDN.
//!
//! Proxy chain headers carry DNs wrapped in angle brackets and concatenated
//! with no separator, e.g. `<cn=a,o=x><cn=b,o=y>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};

/// Split a DN into its RDNs, honoring backslash escapes
fn split_rdns(dn: &str) -> Vec<String> {
    let mut rdns = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in dn.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            ',' => {
                let rdn = current.trim();
                if !rdn.is_empty() {
                    rdns.push(rdn.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let rdn = current.trim();
    if !rdn.is_empty() {
        rdns.push(rdn.to_string());
    }
    rdns
}

fn normalize_rdn(rdn: &str) -> String {
    match rdn.split_once('=') {
        Some((attr, value)) => format!("{}={}", attr.trim(), value.trim()).to_lowercase(),
        None => rdn.trim().to_lowercase(),
    }
}

/// Normalize a DN for comparison
pub fn normalize_dn(dn: &str) -> String {
    split_rdns(dn)
        .iter()
        .map(|rdn| normalize_rdn(rdn))
        .collect::<Vec<_>>()
        .join(",")
}

/// Value of the first RDN with the given attribute name
fn attribute<'a>(rdns: &'a [String], name: &str) -> Option<&'a str> {
    rdns.iter().find_map(|rdn| {
        let (attr, value) = rdn.split_once('=')?;
        attr.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

/// Human-friendly name for a DN: the last whitespace-separated token of its CN.
///
/// Falls back to the whole DN when no CN is present.
pub fn short_name(dn: &str) -> String {
    let rdns = split_rdns(dn);
    let cn = attribute(&rdns, "cn").unwrap_or(dn).trim();
    match cn.rsplit_once(' ') {
        Some((_, last)) => last.to_string(),
        None => cn.to_string(),
    }
}

/// Whether any OU of the DN names a non-person entity
pub fn is_server_dn<S: AsRef<str>>(dn: &str, npe_ou_list: &[S]) -> bool {
    split_rdns(dn).iter().any(|rdn| match rdn.split_once('=') {
        Some((attr, value)) if attr.trim().eq_ignore_ascii_case("ou") => npe_ou_list
            .iter()
            .any(|ou| ou.as_ref().trim().eq_ignore_ascii_case(value.trim())),
        _ => false,
    })
}

/// Split a proxy chain header into normalized DNs.
///
/// A value without any `<` is treated as a single DN. An empty value yields no DNs.
/// Stray text outside the brackets or an empty `<>` entry is rejected.
pub fn split_proxied_dns(header: &str, allow_duplicates: bool) -> AuthResult<Vec<String>> {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if !trimmed.contains('<') {
        return Ok(vec![normalize_dn(trimmed)]);
    }
    if !trimmed.starts_with('<') || !trimmed.ends_with('>') {
        return Err(AuthError::credentials(format!(
            "Malformed proxied DN list: {}",
            trimmed
        )));
    }

    let inner = &trimmed[1..trimmed.len() - 1];
    let mut dns: Vec<String> = Vec::new();
    for part in inner.split("><") {
        if part.trim().is_empty() || part.contains('<') || part.contains('>') {
            return Err(AuthError::credentials(format!(
                "Malformed proxied DN list: {}",
                trimmed
            )));
        }
        let dn = normalize_dn(part);
        if allow_duplicates || !dns.contains(&dn) {
            dns.push(dn);
        }
    }
    Ok(dns)
}

/// Wrap each DN in angle brackets and concatenate with no separator
pub fn build_proxied_dn<I, S>(dns: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dns.into_iter().fold(String::new(), |mut out, dn| {
        out.push('<');
        out.push_str(dn.as_ref());
        out.push('>');
        out
    })
}

/// A subject DN together with the DN of the authority that issued it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawDnPair")]
pub struct SubjectIssuerDnPair {
    subject_dn: String,
    issuer_dn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDnPair {
    subject_dn: String,
    issuer_dn: String,
}

impl From<RawDnPair> for SubjectIssuerDnPair {
    fn from(raw: RawDnPair) -> Self {
        Self::new(&raw.subject_dn, &raw.issuer_dn)
    }
}

impl SubjectIssuerDnPair {
    pub fn new(subject_dn: &str, issuer_dn: &str) -> Self {
        Self {
            subject_dn: normalize_dn(subject_dn),
            issuer_dn: normalize_dn(issuer_dn),
        }
    }

    pub fn subject_dn(&self) -> &str {
        &self.subject_dn
    }

    pub fn issuer_dn(&self) -> &str {
        &self.issuer_dn
    }
}

impl fmt::Display for SubjectIssuerDnPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.subject_dn, self.issuer_dn)
    }
}

impl FromStr for SubjectIssuerDnPair {
    type Err = AuthError;

    /// Parse the `subject<issuer>` form produced by `Display`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (subject, rest) = trimmed
            .split_once('<')
            .ok_or_else(|| AuthError::credentials(format!("Missing issuer in {}", trimmed)))?;
        let issuer = rest
            .strip_suffix('>')
            .filter(|issuer| !issuer.contains('<') && !issuer.contains('>'))
            .ok_or_else(|| AuthError::credentials(format!("Malformed DN pair {}", trimmed)))?;
        if subject.trim().is_empty() || issuer.trim().is_empty() {
            return Err(AuthError::credentials(format!("Malformed DN pair {}", trimmed)));
        }
        Ok(Self::new(subject, issuer))
    }
}
