//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    routing::any,
    Router,
};
use tokio::net::TcpListener;

use ingress_proxy::control_plane::{
    BackendRef, HostRule, PathMatchKind, PathRule, PortRef, RouteSpec, ServicePort, ServiceSpec,
};
use ingress_proxy::routing::RoutingTable;
use ingress_proxy::snapshot::SnapshotBuilder;

/// Start an echo backend that reflects method, path, probe header, request-id
/// presence, and body into the response text.
#[allow(dead_code)]
pub async fn spawn_echo_backend() -> SocketAddr {
    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> String {
        let probe = headers
            .get("x-probe")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        format!(
            "{} {} probe={} request_id={} body={}",
            method,
            uri.path(),
            probe,
            headers.contains_key("x-request-id"),
            String::from_utf8_lossy(&body),
        )
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A service named `localhost` so built backend URLs resolve to loopback.
#[allow(dead_code)]
pub fn loopback_service(port: u16) -> ServiceSpec {
    ServiceSpec {
        name: "localhost".to_string(),
        namespace: "default".to_string(),
        ports: vec![ServicePort {
            name: Some("http".to_string()),
            port,
        }],
    }
}

/// A one-host route with the given path rules against the loopback service.
#[allow(dead_code)]
pub fn loopback_route(name: &str, host: &str, paths: Vec<(&str, PathMatchKind, u16)>) -> RouteSpec {
    RouteSpec {
        name: name.to_string(),
        namespace: "default".to_string(),
        annotations: Default::default(),
        rules: vec![HostRule {
            host: host.to_string(),
            paths: paths
                .into_iter()
                .map(|(path, match_kind, port)| PathRule {
                    path: path.to_string(),
                    match_kind,
                    backend: BackendRef {
                        service: "localhost".to_string(),
                        port: PortRef::Number(port),
                    },
                })
                .collect(),
        }],
        tls: Vec::new(),
    }
}

/// Build a snapshot from `source` and publish it into a fresh table.
#[allow(dead_code)]
pub fn publish<S: ingress_proxy::control_plane::ControlPlaneSource>(
    source: &Arc<S>,
) -> Arc<RoutingTable> {
    let table = Arc::new(RoutingTable::new());
    let snapshot = SnapshotBuilder::new(Arc::clone(source))
        .build(uuid::Uuid::new_v4())
        .unwrap();
    table.replace(snapshot);
    table
}

/// Poll `condition` until it holds or a generous deadline passes.
#[allow(dead_code)]
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not met within deadline");
}
