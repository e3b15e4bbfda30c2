//! Snapshot assembly from control-plane state.
//!
//! # Responsibilities
//! - List every route object and resolve its backends and certificates
//! - Skip individual items that fail to resolve, keeping the rest
//! - Produce one complete, immutable [`Snapshot`]
//!
//! # Design Decisions
//! - Every rebuild starts from a fresh full listing; no incremental deltas
//! - A rule whose service or named port does not resolve is dropped, but its
//!   virtual host is still created — absence of backends is not an error
//! - Secrets are parsed once per TLS binding and fanned out to every covered
//!   hostname

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::control_plane::{BackendRef, ControlPlaneSource, PortRef, RouteSpec, SourceError};
use crate::snapshot::{parse_key_pair, CertificateEntry, RouteRule, Snapshot, VirtualHost};

/// Builds routing snapshots from a control-plane source.
///
/// Pure transform: no locking, no network serving. The only failure that
/// aborts a build is the listing itself being unavailable.
pub struct SnapshotBuilder<S> {
    source: Arc<S>,
}

impl<S: ControlPlaneSource> SnapshotBuilder<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Assemble a complete snapshot from the current control-plane listing.
    ///
    /// `rebuild_id` correlates every log line of one rebuild.
    pub fn build(&self, rebuild_id: Uuid) -> Result<Snapshot, SourceError> {
        let routes = self.source.list_routes()?;

        let mut hosts: HashMap<String, VirtualHost> = HashMap::new();
        for spec in &routes {
            let certificates = self.resolve_certificates(spec, rebuild_id);

            for rule in &spec.rules {
                let vhost = hosts.entry(rule.host.clone()).or_default();
                vhost
                    .annotations
                    .extend(spec.annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
                vhost.certificates.extend(certificates.iter().cloned());

                for path in &rule.paths {
                    match self.resolve_backend(&spec.namespace, &path.backend) {
                        Some(backend) => vhost.backends.push(RouteRule {
                            path: path.path.clone(),
                            match_kind: path.match_kind,
                            backend,
                        }),
                        None => {
                            tracing::warn!(
                                rebuild_id = %rebuild_id,
                                route = %spec.name,
                                namespace = %spec.namespace,
                                host = %rule.host,
                                service = %path.backend.service,
                                port = %path.backend.port,
                                "backend did not resolve, skipping rule"
                            );
                        }
                    }
                }
            }
        }

        Ok(Snapshot::from_hosts(hosts))
    }

    /// Resolve a backend reference to a concrete upstream URL.
    ///
    /// The service must exist in the route's namespace; a named port must
    /// appear in its port table. Either failing skips just this rule.
    fn resolve_backend(&self, namespace: &str, backend: &BackendRef) -> Option<Url> {
        let service = self.source.service(namespace, &backend.service)?;
        let port = match &backend.port {
            PortRef::Number(number) => *number,
            PortRef::Name(name) => {
                service
                    .ports
                    .iter()
                    .find(|p| p.name.as_deref() == Some(name.as_str()))?
                    .port
            }
        };
        Url::parse(&format!("http://{}:{}", backend.service, port)).ok()
    }

    /// Resolve every TLS binding of one route object into certificate entries.
    ///
    /// A missing or unparseable secret skips only its own binding.
    fn resolve_certificates(&self, spec: &RouteSpec, rebuild_id: Uuid) -> Vec<CertificateEntry> {
        let mut entries = Vec::new();
        for binding in &spec.tls {
            let Some(secret) = self.source.secret(&spec.namespace, &binding.secret_name) else {
                tracing::warn!(
                    rebuild_id = %rebuild_id,
                    route = %spec.name,
                    namespace = %spec.namespace,
                    secret = %binding.secret_name,
                    "TLS secret not found, skipping binding"
                );
                continue;
            };

            match parse_key_pair(&secret.cert, &secret.key) {
                Ok(key) => {
                    for host in &binding.hosts {
                        entries.push(CertificateEntry::new(host.clone(), Arc::clone(&key)));
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        rebuild_id = %rebuild_id,
                        route = %spec.name,
                        namespace = %spec.namespace,
                        secret = %binding.secret_name,
                        error = %err,
                        "TLS secret unparseable, skipping binding"
                    );
                }
            }
        }
        entries
    }
}
