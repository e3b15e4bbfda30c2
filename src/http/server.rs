//! Listener entry points.
//!
//! # Responsibilities
//! - Bind the plaintext and TLS listeners
//! - Wire the TLS listener's certificate selection to the routing table
//! - Drain both listeners gracefully on shutdown
//!
//! # Design Decisions
//! - A bind failure on either port is fatal; there is no degraded mode with
//!   only one listener
//! - Shutdown stops accepting and lets in-flight requests finish within a
//!   drain deadline

use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::http::{proxy, redirect};
use crate::net;
use crate::routing::RoutingTable;

const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// Errors terminating the serving path.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("listener failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// The traffic-serving half of the proxy.
pub struct Server {
    table: Arc<RoutingTable>,
    config: ProxyConfig,
}

impl Server {
    pub fn new(table: Arc<RoutingTable>, config: ProxyConfig) -> Self {
        Self { table, config }
    }

    /// Serve until shutdown. Blocks for the lifetime of the process.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), ServeError> {
        let tls_config = RustlsConfig::from_config(net::server_config(Arc::clone(&self.table))?);

        let https_handle = Handle::new();
        let http_handle = Handle::new();
        tokio::spawn(drain_on_shutdown(
            shutdown,
            https_handle.clone(),
            http_handle.clone(),
        ));

        tracing::info!(
            https = %self.config.https_addr,
            http = %self.config.http_addr,
            "listeners starting"
        );

        let https = axum_server::bind_rustls(self.config.https_addr, tls_config)
            .handle(https_handle)
            .serve(proxy::app(Arc::clone(&self.table)).into_make_service());
        let http = axum_server::bind(self.config.http_addr)
            .handle(http_handle)
            .serve(redirect::app().into_make_service());

        tokio::try_join!(https, http)?;

        tracing::info!("listeners stopped");
        Ok(())
    }
}

async fn drain_on_shutdown(
    mut shutdown: broadcast::Receiver<()>,
    https_handle: Handle,
    http_handle: Handle,
) {
    let _ = shutdown.recv().await;
    tracing::info!(deadline = ?DRAIN_DEADLINE, "draining listeners");
    https_handle.graceful_shutdown(Some(DRAIN_DEADLINE));
    http_handle.graceful_shutdown(Some(DRAIN_DEADLINE));
}
