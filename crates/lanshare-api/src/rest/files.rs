//! Shared folder handlers: listing, upload, download and delete

use super::{ApiError, ApiState};
use crate::catalog::{human_readable_size, upload_file_name};
use crate::types::{FileEntry, StorageResponse};
use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, State},
    http::header,
    response::{Redirect, Response},
    Json,
};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

/// Multipart field carrying the uploaded file
const UPLOAD_FIELD: &str = "file";

pub(super) async fn list_files(
    State(state): State<ApiState>,
) -> Result<Json<Vec<FileEntry>>, ApiError> {
    Ok(Json(state.catalog.list().await?))
}

pub(super) async fn storage_usage(
    State(state): State<ApiState>,
) -> Result<Json<StorageResponse>, ApiError> {
    let used = state.catalog.used_bytes().await?;
    Ok(Json(StorageResponse {
        used,
        used_human: human_readable_size(used),
    }))
}

/// Stores the `file` field under its base name, then sends the browser home
pub(super) async fn upload_file(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Redirect, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let name = upload_file_name(&raw_name)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid upload name: {:?}", raw_name)))?
            .to_string();

        let file = state.catalog.create(&name).await?;
        match write_field(file, field).await {
            Ok(size) => {
                info!(file = %name, size, "Stored upload");
                return Ok(Redirect::to("/"));
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Upload aborted, removing partial file");
                if let Err(cleanup) = state.catalog.delete(&name).await {
                    warn!(file = %name, error = %cleanup, "Failed to remove partial upload");
                }
                return Err(e);
            }
        }
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

async fn write_field(mut file: File, mut field: Field<'_>) -> Result<u64, ApiError> {
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(written)
}

/// Streams a stored file as an attachment
pub(super) async fn download_file(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let (file, len) = state.catalog.open(&filename).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        filename.replace(['"', '\\'], "_")
    );

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::InternalError(e.to_string()))
}

pub(super) async fn delete_file(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<Redirect, ApiError> {
    state.catalog.delete(&filename).await?;
    info!(file = %filename, "Deleted file");
    Ok(Redirect::to("/"))
}
