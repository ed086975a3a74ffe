//! `/pipeline` routes.

use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use sheetgate_protocol::MessageBody;
use std::sync::Arc;

use super::files::send_file;
use super::{ApiError, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run_pipeline", post(run_pipeline))
        .route("/download_mapped", get(download_mapped))
}

async fn run_pipeline(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageBody>, ApiError> {
    let message = state.pipeline.run_pipeline().await?;
    Ok(Json(MessageBody::success(message)))
}

/// Pull the mapped result from the processing service, then serve the local copy.
async fn download_mapped(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let result = state.pipeline.fetch_mapped_result().await?;
    Ok(send_file(&result.path, result.file_name).await?)
}
