//! Immutable routing snapshot.
//!
//! # Responsibilities
//! - Model one complete view of routing intent: virtual hosts, their ordered
//!   backend rules, and their certificates
//! - Answer the two hot-path questions: which backend serves this request,
//!   and which certificate serves this SNI name
//!
//! # Design Decisions
//! - A snapshot is immutable once built; request handlers share it through
//!   `Arc` with no further synchronization
//! - Backend rules keep declaration order: first match wins, nothing is
//!   re-sorted by specificity
//! - Certificate lookup is a search, not a map lookup, because wildcard
//!   patterns match a whole label subtree

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rustls::sign::CertifiedKey;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use url::Url;

use crate::control_plane::PathMatchKind;

pub mod builder;

pub use builder::SnapshotBuilder;

/// Errors turning secret key material into a usable certificate.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate PEM unreadable: {0}")]
    Pem(#[from] std::io::Error),

    #[error("no certificate found in PEM data")]
    NoCertificate,

    #[error("no private key found in PEM data")]
    NoPrivateKey,

    #[error("unsupported private key: {0}")]
    UnsupportedKey(rustls::Error),
}

/// Parse a PEM certificate chain and private key into a rustls key pair.
pub fn parse_key_pair(
    cert_pem: &[u8],
    key_pem: &[u8],
) -> Result<Arc<CertifiedKey>, CertificateError> {
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut &cert_pem[..]).collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(CertificateError::NoCertificate);
    }

    let key: PrivateKeyDer<'static> =
        rustls_pemfile::private_key(&mut &key_pem[..])?.ok_or(CertificateError::NoPrivateKey)?;
    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key)
        .map_err(CertificateError::UnsupportedKey)?;

    Ok(Arc::new(CertifiedKey::new(certs, signing_key)))
}

/// One routing entry: a path pattern and the backend it proxies to.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub path: String,
    pub match_kind: PathMatchKind,
    /// Upstream base URL, always `http://service:port`.
    pub backend: Url,
}

impl RouteRule {
    /// Whether this rule matches the given request path.
    pub fn matches(&self, request_path: &str) -> bool {
        match self.match_kind {
            PathMatchKind::Exact => request_path == self.path,
            PathMatchKind::Prefix => request_path.starts_with(&self.path),
        }
    }

    /// The upstream `host:port` for request forwarding.
    pub fn upstream_authority(&self) -> String {
        let host = self.backend.host_str().unwrap_or_default();
        match self.backend.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

/// A certificate bound to an exact name or a `*.domain` wildcard pattern.
#[derive(Clone)]
pub struct CertificateEntry {
    host_pattern: String,
    key: Arc<CertifiedKey>,
}

impl CertificateEntry {
    pub fn new(host_pattern: impl Into<String>, key: Arc<CertifiedKey>) -> Self {
        Self {
            host_pattern: host_pattern.into(),
            key,
        }
    }

    pub fn host_pattern(&self) -> &str {
        &self.host_pattern
    }

    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.key)
    }
}

impl fmt::Debug for CertificateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateEntry")
            .field("host_pattern", &self.host_pattern)
            .finish_non_exhaustive()
    }
}

/// Everything known about one externally-visible DNS host.
#[derive(Debug, Clone, Default)]
pub struct VirtualHost {
    /// Opaque passthrough from the source route object.
    pub annotations: HashMap<String, String>,

    /// Certificates covering this host. Order is not significant.
    pub certificates: Vec<CertificateEntry>,

    /// Backend rules in declaration order. Order IS significant.
    pub backends: Vec<RouteRule>,
}

impl VirtualHost {
    /// First backend rule matching the request path, in declaration order.
    pub fn select_backend(&self, request_path: &str) -> Option<&RouteRule> {
        self.backends.iter().find(|rule| rule.matches(request_path))
    }
}

/// One complete, immutable routing table keyed by exact host name.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    hosts: HashMap<String, VirtualHost>,
}

impl Snapshot {
    pub fn from_hosts(hosts: HashMap<String, VirtualHost>) -> Self {
        Self { hosts }
    }

    /// Exact-host lookup used by the request-routing path.
    pub fn virtual_host(&self, host: &str) -> Option<&VirtualHost> {
        self.hosts.get(host)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Select the certificate for a TLS handshake's server name.
    ///
    /// The exact host's own certificates are searched first. Failing that,
    /// every wildcard pattern in the snapshot is considered and the most
    /// specific match (fewest labels stripped) wins.
    pub fn certificate_for(&self, server_name: &str) -> Option<Arc<CertifiedKey>> {
        if let Some(vhost) = self.hosts.get(server_name) {
            for entry in &vhost.certificates {
                if entry.host_pattern == server_name
                    || wildcard_strip_count(&entry.host_pattern, server_name).is_some()
                {
                    return Some(entry.certified_key());
                }
            }
        }

        let mut best: Option<(usize, &CertificateEntry)> = None;
        for vhost in self.hosts.values() {
            for entry in &vhost.certificates {
                if let Some(stripped) = wildcard_strip_count(&entry.host_pattern, server_name) {
                    if best.map_or(true, |(current, _)| stripped < current) {
                        best = Some((stripped, entry));
                    }
                }
            }
        }
        best.map(|(_, entry)| entry.certified_key())
    }
}

/// Match `name` against a `*.suffix` wildcard pattern by stripping leftmost
/// labels one at a time.
///
/// Returns how many labels were stripped, or `None` if the pattern is not a
/// wildcard or never matches. The apex (`example.com` against
/// `*.example.com`) does not match: at least one label must be stripped.
pub fn wildcard_strip_count(pattern: &str, name: &str) -> Option<usize> {
    let suffix = pattern.strip_prefix("*.")?;
    let mut rest = name;
    let mut stripped = 0;
    while let Some((_, tail)) = rest.split_once('.') {
        stripped += 1;
        rest = tail;
        if rest == suffix {
            return Some(stripped);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(path: &str, kind: PathMatchKind) -> RouteRule {
        RouteRule {
            path: path.to_string(),
            match_kind: kind,
            backend: Url::parse("http://svc:8080").unwrap(),
        }
    }

    fn test_key() -> Arc<CertifiedKey> {
        parse_key_pair(
            include_bytes!("../../tests/certs/wildcard.cert.pem"),
            include_bytes!("../../tests/certs/wildcard.key.pem"),
        )
        .unwrap()
    }

    fn other_test_key() -> Arc<CertifiedKey> {
        parse_key_pair(
            include_bytes!("../../tests/certs/exact.cert.pem"),
            include_bytes!("../../tests/certs/exact.key.pem"),
        )
        .unwrap()
    }

    #[test]
    fn wildcard_strips_one_or_more_labels() {
        assert_eq!(wildcard_strip_count("*.example.com", "a.example.com"), Some(1));
        assert_eq!(
            wildcard_strip_count("*.example.com", "a.b.example.com"),
            Some(2)
        );
    }

    #[test]
    fn wildcard_does_not_match_apex_or_other_domains() {
        assert_eq!(wildcard_strip_count("*.example.com", "example.com"), None);
        assert_eq!(wildcard_strip_count("*.example.com", "a.example.org"), None);
        assert_eq!(wildcard_strip_count("example.com", "example.com"), None);
    }

    #[test]
    fn exact_rule_requires_full_equality() {
        let exact = rule("/x", PathMatchKind::Exact);
        assert!(exact.matches("/x"));
        assert!(!exact.matches("/x/y"));
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let vhost = VirtualHost {
            backends: vec![rule("/x", PathMatchKind::Exact), rule("/", PathMatchKind::Prefix)],
            ..VirtualHost::default()
        };

        let hit = vhost.select_backend("/x").unwrap();
        assert_eq!(hit.match_kind, PathMatchKind::Exact);

        let hit = vhost.select_backend("/x/y").unwrap();
        assert_eq!(hit.match_kind, PathMatchKind::Prefix);

        let empty = VirtualHost::default();
        assert!(empty.select_backend("/x").is_none());
    }

    #[test]
    fn certificate_lookup_prefers_exact_then_most_specific_wildcard() {
        let broad = test_key();
        let narrow = other_test_key();
        let mut hosts = HashMap::new();
        hosts.insert(
            "api.example.com".to_string(),
            VirtualHost {
                certificates: vec![CertificateEntry::new("api.example.com", broad.clone())],
                ..VirtualHost::default()
            },
        );
        hosts.insert(
            "web.example.com".to_string(),
            VirtualHost {
                certificates: vec![
                    CertificateEntry::new("*.example.com", broad.clone()),
                    CertificateEntry::new("*.b.example.com", narrow.clone()),
                ],
                ..VirtualHost::default()
            },
        );
        let snapshot = Snapshot::from_hosts(hosts);

        // Exact host wins without any wildcard walk.
        assert!(snapshot.certificate_for("api.example.com").is_some());

        // Unknown hosts fall back to the wildcard search across all vhosts;
        // the pattern needing the fewest stripped labels wins.
        let hit = snapshot.certificate_for("a.example.com").unwrap();
        assert!(Arc::ptr_eq(&hit, &broad));
        let hit = snapshot.certificate_for("a.b.example.com").unwrap();
        assert!(Arc::ptr_eq(&hit, &narrow));

        // The apex never matches a wildcard, and unrelated names miss.
        assert!(snapshot.certificate_for("example.com").is_none());
        assert!(snapshot.certificate_for("other.test").is_none());
    }

    #[test]
    fn upstream_authority_includes_port() {
        let r = rule("/", PathMatchKind::Prefix);
        assert_eq!(r.upstream_authority(), "svc:8080");
    }
}
