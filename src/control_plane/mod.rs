//! Control-plane boundary.
//!
//! # Responsibilities
//! - Define the resource kinds the proxy observes: routes, services, secrets
//! - Define the change-event vocabulary for watch subscriptions
//! - Define [`ControlPlaneSource`], the seam behind which the concrete
//!   cluster client lives
//!
//! # Design Decisions
//! - Listing is synchronous: a source is expected to answer from a local
//!   cache, the way cluster informers do, not to block on the network
//! - Change events carry no payload. The rebuild pipeline always re-derives
//!   the full snapshot from a fresh listing, so a partially-applied
//!   incremental update can never exist

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod dir;
pub mod memory;

pub use dir::DirSource;
pub use memory::MemorySource;

/// The three resource kinds the proxy watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Route,
    Service,
    Secret,
}

/// What happened to a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Added,
    Updated,
    Deleted,
}

/// One control-plane change notification.
///
/// Deliberately payload-free: every event, regardless of kind or operation,
/// triggers the same full rebuild.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent {
    pub kind: ResourceKind,
    pub op: ChangeOp,
}

/// How a path rule compares against a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMatchKind {
    /// The request path must equal the pattern.
    Exact,
    /// The request path must start with the pattern.
    Prefix,
}

/// A backend service port reference, by number or by name.
///
/// Named ports are resolved through the referenced service's port table at
/// snapshot-build time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PortRef {
    Number(u16),
    Name(String),
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRef::Number(n) => write!(f, "{n}"),
            PortRef::Name(name) => write!(f, "{name}"),
        }
    }
}

/// A reference from a path rule to a backing service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendRef {
    /// Service name, looked up in the route's own namespace.
    pub service: String,

    /// Target port on that service.
    pub port: PortRef,
}

/// One path rule inside a host rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathRule {
    pub path: String,

    #[serde(rename = "match")]
    pub match_kind: PathMatchKind,

    pub backend: BackendRef,
}

/// All path rules for one virtual host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostRule {
    /// Exact DNS name. Wildcards are a certificate concept, not a routing one.
    pub host: String,

    pub paths: Vec<PathRule>,
}

/// Binds a TLS secret to the hostnames it covers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsBinding {
    pub secret_name: String,

    /// Covered hostnames; entries may be wildcard patterns like `*.example.com`.
    pub hosts: Vec<String>,
}

/// A routing-intent object: virtual hosts, path rules, TLS references.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteSpec {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Opaque passthrough bag for collaborator extensions. Never interpreted
    /// by the proxy itself.
    #[serde(default)]
    pub annotations: HashMap<String, String>,

    #[serde(default)]
    pub rules: Vec<HostRule>,

    #[serde(default)]
    pub tls: Vec<TlsBinding>,
}

/// One named port on a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicePort {
    #[serde(default)]
    pub name: Option<String>,

    pub port: u16,
}

/// A backend service and its port table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSpec {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

/// Opaque TLS key material: certificate chain and private key, both PEM.
#[derive(Debug, Clone)]
pub struct SecretSpec {
    pub name: String,
    pub namespace: String,
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

pub(crate) fn default_namespace() -> String {
    "default".to_string()
}

/// Errors surfaced by a control-plane source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The current-state listing could not be retrieved at all. The rebuild
    /// is abandoned and the previously published snapshot stays live.
    #[error("control-plane listing unavailable: {0}")]
    ListUnavailable(String),
}

/// Abstract access to the cluster control plane.
///
/// The proxy core needs exactly two capabilities per resource kind: list the
/// current state, and subscribe to add/update/delete events. Everything else
/// (credentials, caching, transport) belongs to the implementation.
pub trait ControlPlaneSource: Send + Sync + 'static {
    /// List every route object currently known.
    fn list_routes(&self) -> Result<Vec<RouteSpec>, SourceError>;

    /// Look up one service by namespace and name.
    fn service(&self, namespace: &str, name: &str) -> Option<ServiceSpec>;

    /// Look up one secret by namespace and name.
    fn secret(&self, namespace: &str, name: &str) -> Option<SecretSpec>;

    /// Subscribe to change events for one resource kind.
    fn events(&self, kind: ResourceKind) -> broadcast::Receiver<ChangeEvent>;
}
