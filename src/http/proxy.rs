//! The reverse-proxy request path.
//!
//! # Responsibilities
//! - Resolve the request's virtual host from the current snapshot
//! - Select the first backend rule matching the request path
//! - Forward the request upstream, streaming the response back verbatim
//!
//! # Design Decisions
//! - The snapshot is read once per request and reused for its lifetime
//! - Routing is exact-host only; wildcards exist for certificates, not routes
//! - An unmatched path answers 404 rather than dropping the connection
//! - Method, headers, and body pass through unchanged; only scheme and
//!   authority are rewritten

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::routing::RoutingTable;
use crate::snapshot::RouteRule;

/// Shared state of the proxy app.
#[derive(Clone)]
pub struct ProxyState {
    pub table: Arc<RoutingTable>,
    pub client: Client<HttpConnector, Body>,
}

/// Failures rebuilding or sending the upstream request.
#[derive(Debug, Error)]
enum ProxyError {
    #[error("invalid backend authority: {0}")]
    Authority(#[from] axum::http::uri::InvalidUri),

    #[error("invalid upstream uri: {0}")]
    Uri(#[from] axum::http::uri::InvalidUriParts),

    #[error("upstream request could not be built: {0}")]
    Request(#[from] axum::http::Error),

    #[error(transparent)]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Build the proxy app over the given routing table.
pub fn app(table: Arc<RoutingTable>) -> Router {
    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    Router::new()
        .route("/", any(proxy_handler))
        .route("/{*path}", any(proxy_handler))
        .with_state(ProxyState { table, client })
        .layer(TraceLayer::new_for_http())
}

async fn proxy_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let request_id = Uuid::new_v4();

    // One snapshot for the whole request; a concurrent rebuild cannot change
    // our view mid-flight.
    let snapshot = state.table.current();

    let Some(host) = request_host(&request) else {
        return (StatusCode::BAD_REQUEST, "missing host").into_response();
    };
    let path = request.uri().path().to_string();

    let Some(vhost) = snapshot.virtual_host(&host) else {
        tracing::debug!(request_id = %request_id, host = %host, "service not found");
        return (StatusCode::NOT_FOUND, "service not found").into_response();
    };

    let Some(rule) = vhost.select_backend(&path) else {
        tracing::debug!(request_id = %request_id, host = %host, path = %path, "no backend rule matched");
        return (StatusCode::NOT_FOUND, "no backend matched").into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        host = %host,
        path = %path,
        backend = %rule.backend,
        "proxying request"
    );

    match forward(&state.client, rule, request, request_id).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                backend = %rule.backend,
                error = %err,
                "upstream request failed"
            );
            (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
        }
    }
}

/// Rewrite scheme and authority towards the backend and stream the exchange.
async fn forward(
    client: &Client<HttpConnector, Body>,
    rule: &RouteRule,
    request: Request<Body>,
    request_id: Uuid,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(Authority::from_str(&rule.upstream_authority())?);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    let uri = Uri::from_parts(uri_parts)?;

    let mut builder = Request::builder().method(parts.method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        *headers = parts.headers;
        if let Ok(value) = header::HeaderValue::from_str(&request_id.to_string()) {
            headers.insert("x-request-id", value);
        }
    }
    let upstream_request = builder.body(body)?;

    let upstream_response = client.request(upstream_request).await?;
    let (parts, body) = upstream_response.into_parts();
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// The request's target host with any `:port` suffix stripped.
///
/// HTTP/2 carries it in the `:authority` pseudo-header (and thus the URI);
/// HTTP/1.1 in the `Host` header.
pub(crate) fn request_host<B>(request: &Request<B>) -> Option<String> {
    if let Some(host) = request.uri().host() {
        return Some(host.to_string());
    }
    let raw = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())?;
    raw.split(':').next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_comes_from_header_without_port() {
        let request = Request::builder()
            .uri("/health")
            .header("Host", "api.example.com:8443")
            .body(())
            .unwrap();
        assert_eq!(request_host(&request).as_deref(), Some("api.example.com"));
    }

    #[test]
    fn host_prefers_absolute_uri_authority() {
        let request = Request::builder()
            .uri("http://api.example.com/health")
            .header("Host", "other.example.com")
            .body(())
            .unwrap();
        assert_eq!(request_host(&request).as_deref(), Some("api.example.com"));
    }

    #[test]
    fn missing_host_is_none() {
        let request = Request::builder().uri("/health").body(()).unwrap();
        assert_eq!(request_host(&request), None);
    }
}
