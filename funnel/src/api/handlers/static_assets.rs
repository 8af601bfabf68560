//! HTTP handlers for the embedded funnel pages.

use axum::{
    Json,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, instrument};

use crate::static_assets::Assets;

/// Embedded file for a request path. Page routes map to their HTML file, so `/watch` serves
/// `watch.html`.
fn resolve(path: &str) -> Option<(String, rust_embed::EmbeddedFile)> {
    let path = path.trim_start_matches('/').trim_end_matches('/');
    if path.is_empty() {
        return Assets::get("index.html").map(|f| ("index.html".to_string(), f));
    }
    if let Some(file) = Assets::get(path) {
        return Some((path.to_string(), file));
    }
    let page = format!("{path}.html");
    Assets::get(&page).map(|f| (page, f))
}

fn asset_response(path: &str, file: rust_embed::EmbeddedFile) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    // Stylesheets and scripts change rarely; pages are always revalidated
    let cache_control = if path.ends_with(".html") {
        "no-cache"
    } else {
        "public, max-age=3600"
    };

    (
        [(header::CONTENT_TYPE, mime.to_string()), (header::CACHE_CONTROL, cache_control.to_string())],
        file.data.into_owned(),
    )
        .into_response()
}

/// Serve embedded pages, falling back to the landing page for unknown paths
#[instrument]
pub async fn serve_embedded_asset(uri: Uri) -> Response {
    let path = uri.path();

    // Unknown API routes stay JSON
    if path.starts_with("/api/") || path.starts_with("/admin/api/") || path.starts_with("/webhooks/") {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response();
    }

    if let Some((resolved, file)) = resolve(path) {
        return asset_response(&resolved, file);
    }

    debug!("No embedded asset for {}, serving landing page", path);
    match Assets::get("index.html") {
        Some(index) => asset_response("index.html", index),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
