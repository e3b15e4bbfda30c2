//! Plaintext listener: unconditional redirect to https.
//!
//! No routing table lookup happens here; the encrypted listener does the
//! real work after the client comes back.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the redirect app.
pub fn app() -> Router {
    Router::new()
        .route("/", any(redirect_handler))
        .route("/{*path}", any(redirect_handler))
        .layer(TraceLayer::new_for_http())
}

async fn redirect_handler(request: Request<Body>) -> Response {
    // Host verbatim, port included, so non-standard deployments survive.
    let host = match raw_host(&request) {
        Some(host) => host,
        None => return (StatusCode::BAD_REQUEST, "missing host").into_response(),
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = format!("https://{host}{path_and_query}");

    match HeaderValue::from_str(&location) {
        Ok(value) => {
            tracing::debug!(location = %location, "redirecting to https");
            (StatusCode::FOUND, [(header::LOCATION, value)]).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid host").into_response(),
    }
}

fn raw_host<B>(request: &Request<B>) -> Option<String> {
    if let Some(authority) = request.uri().authority() {
        return Some(authority.to_string());
    }
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[tokio::test]
    async fn redirects_with_found_status_and_https_location() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health?probe=1")
                    .header("Host", "app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://app.example.com/health?probe=1"
        );
    }

    #[tokio::test]
    async fn keeps_a_nonstandard_port_in_the_location() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("Host", "app.example.com:8080")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://app.example.com:8080/"
        );
    }

    #[tokio::test]
    async fn missing_host_is_rejected() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
