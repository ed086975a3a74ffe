//! `/files` routes: uploads, listing, downloads and reset.

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use sheetgate_protocol::defaults::{ALLOWED_UPLOAD_EXTENSIONS, XLSX_CONTENT_TYPE};
use sheetgate_protocol::{
    ArtifactRole, FileListBody, MessageBody, ResetBody, STATUS_SUCCESS,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::error::{is_not_found, GatewayError, Result};

const BYTES_PER_MB: u64 = 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload_raw", post(upload_raw))
        .route("/upload_master", post(upload_master))
        .route("/list_files", get(list_files))
        .route("/download/:filename", get(download_file))
        .route("/download_mapped", get(download_mapped))
        .route("/reset", post(reset))
}

async fn upload_raw(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> std::result::Result<Json<MessageBody>, ApiError> {
    let message = receive_upload(&state, ArtifactRole::Raw, multipart).await?;
    Ok(Json(MessageBody::success(message)))
}

async fn upload_master(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> std::result::Result<Json<MessageBody>, ApiError> {
    let message = receive_upload(&state, ArtifactRole::Master, multipart).await?;
    Ok(Json(MessageBody::success(message)))
}

async fn list_files(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<FileListBody>, ApiError> {
    let files = state.store().list_visible().await?;
    Ok(Json(FileListBody {
        status: STATUS_SUCCESS.to_string(),
        files,
    }))
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    AxumPath(filename): AxumPath<String>,
) -> std::result::Result<Response, ApiError> {
    let path = state.store().locate(&filename).await?;
    Ok(send_file(&path, &filename).await?)
}

async fn download_mapped(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Response, ApiError> {
    let name = ArtifactRole::Mapped.file_name();
    let path = match state.store().locate(name).await {
        Ok(path) => path,
        Err(GatewayError::NotFound(_)) => {
            return Err(GatewayError::not_found(
                "Mapped file not found. Please run the pipeline first.",
            )
            .into())
        }
        Err(e) => return Err(e.into()),
    };
    Ok(send_file(&path, name).await?)
}

async fn reset(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<ResetBody>, ApiError> {
    let outcome = state.pipeline.reset_all().await?;
    Ok(Json(ResetBody {
        status: STATUS_SUCCESS.to_string(),
        message: outcome.message,
        removed: outcome.removed,
        remote: outcome.remote,
    }))
}

// ============================================================================
// Upload intake
// ============================================================================

/// Stream the role's multipart field into the intake area, then promote it.
async fn receive_upload(
    state: &AppState,
    role: ArtifactRole,
    mut multipart: Multipart,
) -> Result<String> {
    let Some(expected) = role.field_name() else {
        return Err(GatewayError::invalid_input(format!("{} cannot be uploaded", role)));
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(expected) {
            debug!(field = ?field.name(), expected, "Ignoring unexpected multipart field");
            continue;
        }

        let original = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| GatewayError::invalid_input("No file uploaded."))?;
        check_extension(&original)?;

        let store = state.store();
        store.ensure_intake().await?;
        let temp_path = store.new_intake_path(expected, &original);

        let size = match write_field(field, &temp_path, state.max_upload_bytes).await {
            Ok(size) => size,
            Err(e) => {
                store.discard(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = store.promote(&temp_path, role).await {
            store.discard(&temp_path).await;
            return Err(e);
        }

        info!(role = %role, original = %original, bytes = size, "Upload staged");
        return Ok(format!("{} uploaded successfully.", role.file_name()));
    }

    Err(GatewayError::invalid_input("No file uploaded."))
}

async fn write_field(mut field: Field<'_>, path: &Path, limit: u64) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| GatewayError::io("Failed to store upload", e))?;

    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > limit {
            return Err(GatewayError::invalid_input(format!(
                "File exceeds the maximum upload size of {} MB.",
                limit / BYTES_PER_MB
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| GatewayError::io("Failed to store upload", e))?;
    }
    file.flush()
        .await
        .map_err(|e| GatewayError::io("Failed to store upload", e))?;
    Ok(size)
}

fn check_extension(file_name: &str) -> Result<()> {
    let allowed = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_UPLOAD_EXTENSIONS
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);
    if allowed {
        Ok(())
    } else {
        Err(GatewayError::invalid_input(format!(
            "Unsupported file type: {}. Allowed types: {}",
            file_name,
            ALLOWED_UPLOAD_EXTENSIONS.join(", ")
        )))
    }
}

fn multipart_error(err: MultipartError) -> GatewayError {
    GatewayError::invalid_input(format!("Invalid multipart upload: {}", err.body_text()))
}

// ============================================================================
// Downloads
// ============================================================================

/// Stream a staged file as an attachment.
pub(super) async fn send_file(path: &Path, name: &str) -> Result<Response> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        if is_not_found(&e) {
            GatewayError::not_found("File not found.")
        } else {
            GatewayError::io("Failed to read staged file", e)
        }
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| GatewayError::io("Failed to read staged file", e))?
        .len();

    Response::builder()
        .header(CONTENT_TYPE, content_type_for(name))
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", header_safe(name)),
        )
        .header(CONTENT_LENGTH, len)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| GatewayError::internal(format!("Failed to build download response: {}", e)))
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => XLSX_CONTENT_TYPE,
        Some(ext) if ext.eq_ignore_ascii_case("xls") => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
