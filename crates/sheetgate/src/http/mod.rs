//! HTTP boundary.
//!
//! Thin axum adapters over the stage store and the pipeline orchestrator.
//! Every route is served at the root and again under `/api`.

mod error;
mod files;
mod pipeline;

pub use error::ApiError;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use sheetgate_protocol::MessageBody;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::orchestrator::PipelineOrchestrator;
use crate::remote::{HttpRemoteClient, RemotePipeline};
use crate::stage::StageStore;

/// Slack above the upload limit for multipart framing and small text fields.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Shared state behind every handler.
pub struct AppState {
    pub pipeline: PipelineOrchestrator<Arc<dyn RemotePipeline>>,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(store: StageStore, remote: Arc<dyn RemotePipeline>, max_upload_bytes: u64) -> Self {
        Self {
            pipeline: PipelineOrchestrator::new(store, remote),
            max_upload_bytes,
        }
    }

    /// State wired to the real processing service.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let remote = HttpRemoteClient::new(config)?;
        Ok(Self::new(
            StageStore::new(config),
            Arc::new(remote),
            config.max_upload_bytes,
        ))
    }

    pub fn store(&self) -> &StageStore {
        self.pipeline.store()
    }
}

/// Build the gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit: usize = state
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
        .try_into()
        .unwrap_or(usize::MAX);

    let api = Router::new()
        .nest("/files", files::routes())
        .nest("/pipeline", pipeline::routes());

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .merge(api.clone())
        .nest("/api", api)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// A panicking handler becomes a generic JSON 500.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ApiError::from(GatewayError::internal(format!("handler panicked: {}", detail))).into_response()
}

async fn health() -> Json<MessageBody> {
    Json(MessageBody {
        status: "OK".to_string(),
        message: "Server is running".to_string(),
    })
}

async fn not_found(uri: Uri) -> ApiError {
    GatewayError::not_found(format!("Can't find {} on this server!", uri)).into()
}

/// Prepare the staging area, bind, and serve until Ctrl-C.
pub async fn serve(config: &GatewayConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config).context("Failed to initialize gateway")?);

    state
        .store()
        .ensure_root()
        .await
        .context("Failed to prepare staging directory")?;
    match state.store().sweep_intake().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Removed leftover intake files"),
        Err(e) => warn!(error = %e, "Failed to sweep intake directory"),
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(
        addr = %listener.local_addr().context("Failed to read bound address")?,
        staging_dir = %config.staging_dir.display(),
        remote = %config.remote_base_url,
        "Gateway listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
