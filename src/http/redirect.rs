//! Plaintext listener: permanent redirect to HTTPS.
//!
//! Every request, whatever its method, host or path, gets a `301` to the
//! canonical host with the original path and query. Nothing is proxied.

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::{Response, StatusCode, Uri};
use axum::Router;

use crate::observability::metrics;

/// Build the redirect-only application.
pub fn redirect_router(canonical_host: &str, https_port: u16) -> Router {
    let authority = if https_port == 443 {
        canonical_host.to_string()
    } else {
        format!("{}:{}", canonical_host, https_port)
    };

    Router::new().fallback(move |uri: Uri| {
        let authority = authority.clone();
        async move { redirect_to_https(&authority, &uri) }
    })
}

/// `301 Moved Permanently` to `https://<authority><path>[?query]`.
fn redirect_to_https(authority: &str, uri: &Uri) -> Response<Body> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let location = format!("https://{}{}", authority, path_and_query);

    metrics::record_redirect();
    tracing::debug!(from = %uri, to = %location, "Redirecting HTTP to HTTPS");

    let mut response = Response::new(Body::empty());
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(_) => *response.status_mut() = StatusCode::BAD_REQUEST,
    }
    response
}
