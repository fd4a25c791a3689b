//! Static file serving.
//!
//! HTML documents are read whole and get the reload snippet injected; every
//! other request goes to [`ServeDir`](tower_http::services::ServeDir)
//! untouched, so range requests, MIME detection and not-found handling all
//! behave as for a plain static server.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;

use crate::live_reload::{InjectionPolicy, inject_reload};
use crate::state::AppState;

/// Directory index document.
const INDEX_FILE: &str = "index.html";

/// Serve a file from the root, injecting the reload snippet into HTML.
pub(crate) async fn serve_static(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let method = req.method();
    if (*method == Method::GET || *method == Method::HEAD)
        && let Some(file) = resolve_html(&state.root, req.uri().path()).await
    {
        return serve_html(&file, &state.injection).await;
    }

    match state.static_files.clone().oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}

/// Read an HTML file and serve it with the reload snippet.
///
/// A resolved HTML file never falls back to the plain static path, so a read
/// failure is a server error rather than an uninjected page.
async fn serve_html(file: &Path, policy: &InjectionPolicy) -> Response {
    match tokio::fs::read(file).await {
        Ok(html) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            inject_reload(&html, policy),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "Failed to read HTML file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Resolve a request path to an HTML file under `root`.
///
/// A directory resolves to its `index.html`. Returns `None` for anything the
/// rewriter should not handle: non-HTML files, directories without an index,
/// missing paths, and paths that fail to decode or leave the root.
async fn resolve_html(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let mut path = root.join(request_relative_path(uri_path)?);

    let metadata = tokio::fs::metadata(&path).await.ok()?;
    if metadata.is_dir() {
        path.push(INDEX_FILE);
        let index = tokio::fs::metadata(&path).await.ok()?;
        return index.is_file().then_some(path);
    }

    (metadata.is_file() && is_html(&path)).then_some(path)
}

/// Percent-decode a URI path into a relative filesystem path.
///
/// Every segment must be a single normal component; `..`, `.` and anything
/// that would be read as a root or prefix reject the whole path.
fn request_relative_path(uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;

    let mut relative = PathBuf::new();
    for segment in decoded.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => relative.push(name),
            _ => return None,
        }
    }
    Some(relative)
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}
