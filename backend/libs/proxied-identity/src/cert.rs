//! Subject/issuer extraction from X.509 client certificates
//!
//! Names are rendered most-specific RDN first (`CN=...,OU=...,O=...`), the
//! conventional string form, then normalized like every other DN.

use x509_parser::objects::{oid2abbrev, oid_registry};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate, X509Name};

use crate::dn::SubjectIssuerDnPair;
use crate::error::{AuthError, AuthResult};

/// DER bytes of the peer certificate captured at connection time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate(pub Vec<u8>);

impl PeerCertificate {
    pub fn dn_pair(&self) -> AuthResult<SubjectIssuerDnPair> {
        pair_from_der(&self.0)
    }
}

fn render_name(name: &X509Name<'_>) -> AuthResult<String> {
    let registry = oid_registry();
    let mut rdns = Vec::new();

    for rdn in name.iter() {
        let mut parts = Vec::new();
        for attribute in rdn.iter() {
            // RFC 4514 keys (CN, OU, O, C, DC), dotted OID when unknown
            let key = oid2abbrev(attribute.attr_type(), registry)
                .map(str::to_string)
                .unwrap_or_else(|_| attribute.attr_type().to_id_string());
            let value = attribute.as_str().map_err(|e| {
                AuthError::credentials(format!("Unreadable certificate name attribute: {}", e))
            })?;
            parts.push(format!("{}={}", key, value.replace(',', "\\,")));
        }
        rdns.push(parts.join("+"));
    }

    rdns.reverse();
    Ok(rdns.join(","))
}

/// Subject and issuer of a DER-encoded certificate
pub fn pair_from_der(der: &[u8]) -> AuthResult<SubjectIssuerDnPair> {
    let (_remainder, cert) = X509Certificate::from_der(der)
        .map_err(|e| AuthError::credentials(format!("Unparseable client certificate: {}", e)))?;

    let subject = render_name(cert.subject())?;
    let issuer = render_name(cert.issuer())?;
    Ok(SubjectIssuerDnPair::new(&subject, &issuer))
}

/// Subject and issuer of a PEM-encoded certificate
pub fn pair_from_pem(pem: &[u8]) -> AuthResult<SubjectIssuerDnPair> {
    let (_remainder, pem) = parse_x509_pem(pem)
        .map_err(|e| AuthError::credentials(format!("Invalid certificate PEM: {}", e)))?;
    pair_from_der(&pem.contents)
}
