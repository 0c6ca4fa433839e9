//! REST API endpoints

use crate::catalog::{CatalogError, FileCatalog};
use crate::types::{ErrorResponse, InfoResponse, PeerEntry};
use axum::{
    extract::{multipart::MultipartError, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use lanshare_discovery::{DiscoveryService, DiscoveryStatus};
use std::sync::Arc;
use tracing::error;

mod files;

// ============================================================================
// State
// ============================================================================

/// Shared state for REST handlers
#[derive(Clone)]
pub struct ApiState {
    pub discovery: Arc<DiscoveryService>,
    pub catalog: Arc<FileCatalog>,
}

impl ApiState {
    pub fn new(discovery: Arc<DiscoveryService>, catalog: Arc<FileCatalog>) -> Self {
        Self { discovery, catalog }
    }
}

// ============================================================================
// Router Setup
// ============================================================================

pub fn create_rest_router(state: ApiState) -> Router {
    Router::new()
        // Node and peers
        .route("/api/info", get(get_info))
        .route("/api/peers", get(list_peers))
        .route("/api/discovery/status", get(discovery_status))
        // Shared folder
        .route("/api/files", get(files::list_files))
        .route("/api/storage", get(files::storage_usage))
        .route("/uploadfile/", post(files::upload_file))
        .route("/downloadfile/{filename}", get(files::download_file))
        .route("/deletefile/{filename}", post(files::delete_file))
        .with_state(state)
}

// ============================================================================
// Node Handlers
// ============================================================================

/// Address and port this node advertises
async fn get_info(State(state): State<ApiState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        local_ip: state.discovery.local_address().to_string(),
        port: state.discovery.config().service_port,
    })
}

/// Live peers, sorted by address
async fn list_peers(State(state): State<ApiState>) -> Json<Vec<PeerEntry>> {
    let peers = state
        .discovery
        .query_peers()
        .into_iter()
        .map(PeerEntry::from)
        .collect();
    Json(peers)
}

async fn discovery_status(State(state): State<ApiState>) -> Json<DiscoveryStatus> {
    Json(state.discovery.status())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid upload: {0}")]
    Upload(#[from] MultipartError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidName(_) => ApiError::BadRequest(err.to_string()),
            CatalogError::NotFound(name) => ApiError::NotFound(format!("File '{}' not found", name)),
            CatalogError::Io(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            // Carries 413 when the body limit is hit
            ApiError::Upload(e) => (e.status(), "invalid_upload", e.body_text()),
            ApiError::InternalError(msg) => {
                error!(error = %msg, "Internal API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_code, message));
        (status, body).into_response()
    }
}
