//! Read-only static file serving.
//!
//! # Responsibilities
//! - Map a request path below the route prefix to a file under the root
//! - Refuse anything that resolves outside the root (403)
//! - Serve `index.html` for directories
//! - Add CORS and cache headers to served files
//!
//! # Design Decisions
//! - The path is percent-decoded before it is checked, so encoded `..`
//!   segments are caught; escapes that do not decode to UTF-8 are refused
//! - Both the root and the candidate are canonicalized: symlinks pointing
//!   outside the root are rejected like `..`
//! - File bodies, ranges and conditional requests are handled by
//!   `tower_http::services::ServeFile`

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::{Request, Response};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::http::response::ProxyError;
use crate::routing::Route;

const INDEX_FILE: &str = "index.html";
const CACHE_CONTROL: &str = "public, max-age=3600";

/// Serve `request` from `root` for the matched `route`.
pub async fn serve(root: &Path, route: &Route, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
    let requested = route.relative_path(request.uri().path());
    let relative = decode_path(&requested)?;
    let file = resolve(root, &relative).await?;

    tracing::debug!(route = route.name(), file = %file.display(), "Serving static file");

    let response = match ServeFile::new(&file).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let (mut parts, body) = response.into_parts();
    if parts.status.is_success() || parts.status.is_redirection() {
        parts
            .headers
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        parts
            .headers
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    }
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// Resolve a decoded relative path to an existing file inside `root`.
pub async fn resolve(root: &Path, relative: &str) -> Result<PathBuf, ProxyError> {
    let sanitized = sanitize(relative).ok_or(ProxyError::Forbidden)?;

    let root = tokio::fs::canonicalize(root).await.map_err(|e| {
        tracing::error!(root = %root.display(), error = %e, "Static root unavailable");
        ProxyError::NotFound
    })?;

    let mut candidate = canonical_within(&root, &root.join(&sanitized)).await?;
    let metadata = tokio::fs::metadata(&candidate)
        .await
        .map_err(|_| ProxyError::NotFound)?;
    if metadata.is_dir() {
        candidate = canonical_within(&root, &candidate.join(INDEX_FILE)).await?;
        let index = tokio::fs::metadata(&candidate)
            .await
            .map_err(|_| ProxyError::NotFound)?;
        if !index.is_file() {
            return Err(ProxyError::NotFound);
        }
    }
    Ok(candidate)
}

async fn canonical_within(root: &Path, path: &Path) -> Result<PathBuf, ProxyError> {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .map_err(|_| ProxyError::NotFound)?;
    if !canonical.starts_with(root) {
        tracing::warn!(path = %path.display(), "Static path escapes root");
        return Err(ProxyError::Forbidden);
    }
    Ok(canonical)
}

/// Turn a rooted request path into a relative filesystem path.
///
/// Returns `None` for `.`/`..` segments, backslashes, NUL bytes or anything
/// that is not a plain file name.
fn sanitize(path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." || segment.contains('\\') || segment.contains('\0') {
            return None;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => out.push(name),
            _ => return None,
        }
    }
    Some(out)
}

/// Decode `%XX` escapes. Malformed escapes are kept literally; bytes that
/// do not form UTF-8 are refused rather than replaced.
fn decode_path(path: &str) -> Result<Cow<'_, str>, ProxyError> {
    percent_decode_str(path).decode_utf8().map_err(|e| {
        tracing::debug!(path, error = %e, "Static path does not decode to UTF-8");
        ProxyError::Forbidden
    })
}
