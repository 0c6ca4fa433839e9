//! Static file serving with embedded assets

use axum::{
    body::Body,
    extract::Path,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use rust_embed::RustEmbed;
use tracing::debug;

/// The browser UI, compiled into the binary
#[derive(RustEmbed)]
#[folder = "web/static/"]
struct StaticAssets;

pub fn create_static_router() -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/static/{*path}", get(serve_asset))
}

async fn serve_index() -> impl IntoResponse {
    serve_embedded("index.html")
}

async fn serve_asset(Path(path): Path<String>) -> impl IntoResponse {
    serve_embedded(&path)
}

fn serve_embedded(path: &str) -> Response<Body> {
    debug!(path = path, "Serving static file");

    match StaticAssets::get(path) {
        Some(content) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(mime_type_for_path(path))),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            ],
            Body::from(content.data),
        )
            .into_response(),
        None => {
            debug!(path = path, "Static file not found");
            (StatusCode::NOT_FOUND, "404 Not Found").into_response()
        }
    }
}

/// Determine MIME type from file extension
fn mime_type_for_path(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or("");

    match extension.to_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
