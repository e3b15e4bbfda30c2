//! Process bootstrap: logging, control-plane source, watch pipeline,
//! listeners, and signal-driven shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ingress_proxy::config::{CoalesceConfig, ProxyConfig};
use ingress_proxy::control_plane::DirSource;
use ingress_proxy::lifecycle::{shutdown, Shutdown};
use ingress_proxy::routing::RoutingTable;
use ingress_proxy::{Server, Watcher};

#[derive(Parser, Debug)]
#[command(name = "ingress-proxy", about = "Cluster-native ingress reverse proxy")]
struct Args {
    /// Directory of control-plane manifest files (*.toml).
    #[arg(long, env = "INGRESS_MANIFEST_DIR", default_value = "manifests")]
    manifest_dir: PathBuf,

    /// Plaintext listener address (redirects to https).
    #[arg(long, env = "INGRESS_HTTP_ADDR", default_value = "0.0.0.0:80")]
    http_addr: SocketAddr,

    /// TLS listener address.
    #[arg(long, env = "INGRESS_HTTPS_ADDR", default_value = "0.0.0.0:443")]
    https_addr: SocketAddr,

    /// Quiet period for change coalescing, in milliseconds.
    #[arg(long, env = "INGRESS_QUIET_PERIOD_MS", default_value_t = 1000)]
    quiet_period_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingress_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = ProxyConfig {
        http_addr: args.http_addr,
        https_addr: args.https_addr,
        coalesce: CoalesceConfig {
            quiet_period_ms: args.quiet_period_ms,
        },
    };

    tracing::info!(
        manifest_dir = ?args.manifest_dir,
        http = %config.http_addr,
        https = %config.https_addr,
        quiet_period_ms = config.coalesce.quiet_period_ms,
        "ingress-proxy starting"
    );

    let source = DirSource::new(&args.manifest_dir);
    // Must stay alive for manifest change events to flow.
    let _manifest_watcher = source.watch()?;

    let table = Arc::new(RoutingTable::new());
    let watcher = Watcher::new(
        Arc::clone(&source),
        Arc::clone(&table),
        config.coalesce.quiet_period(),
    );
    let server = Server::new(table, config);

    let shutdown_scope = Shutdown::new();
    let mut watch_task = tokio::spawn(watcher.run(shutdown_scope.subscribe()));
    let mut serve_task = tokio::spawn(server.run(shutdown_scope.subscribe()));

    tokio::select! {
        _ = shutdown::wait_for_signal() => {
            tracing::info!("shutdown signal received");
            shutdown_scope.trigger();
            let (watch_result, serve_result) = tokio::join!(&mut watch_task, &mut serve_task);
            watch_result??;
            serve_result??;
        }
        result = &mut serve_task => {
            shutdown_scope.trigger();
            result??;
        }
        result = &mut watch_task => {
            shutdown_scope.trigger();
            result??;
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
