//! Per-SNI certificate selection on the handshake hot path.
//!
//! # Responsibilities
//! - Resolve a server certificate from the live routing table for every
//!   TLS ClientHello
//! - Assemble the rustls server configuration both listeners' TLS side uses
//!
//! # Design Decisions
//! - The resolver reads the routing table once per handshake; certificate
//!   material is parsed at snapshot-build time, never here
//! - No static certificate file exists; an empty table simply fails every
//!   handshake with "certificate not found"

use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;

use crate::routing::RoutingTable;

/// Resolves certificates from the currently published snapshot.
pub struct SnapshotCertResolver {
    table: Arc<RoutingTable>,
}

impl SnapshotCertResolver {
    pub fn new(table: Arc<RoutingTable>) -> Self {
        Self { table }
    }
}

impl std::fmt::Debug for SnapshotCertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCertResolver").finish_non_exhaustive()
    }
}

impl ResolvesServerCert for SnapshotCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let raw = client_hello.server_name()?;
        let name = raw.split(':').next().unwrap_or(raw);

        // One table read per handshake; the snapshot cannot change under us.
        let snapshot = self.table.current();
        let key = snapshot.certificate_for(name);
        if key.is_none() {
            tracing::warn!(server_name = %name, "certificate not found, refusing handshake");
        }
        key
    }
}

/// Build the rustls server config backed by the live routing table.
pub fn server_config(table: Arc<RoutingTable>) -> Result<Arc<ServerConfig>, rustls::Error> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(SnapshotCertResolver::new(table)));
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}
