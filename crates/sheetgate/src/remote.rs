//! Processing-service client.
//!
//! The gateway drives the remote pipeline through the [`RemotePipeline`]
//! trait so the orchestrator can run against an in-process stub in tests.
//! [`HttpRemoteClient`] is the production implementation.
//!
//! # Error translation
//!
//! - No response at all (connect failure, timeout, body broken mid-stream)
//!   becomes `RemoteUnavailable`. Nothing is retried.
//! - A response carrying an application error becomes `RemoteRejected` with
//!   the remote message and status.
//! - A request that could not be built becomes `ClientFault`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode};
use sheetgate_protocol::defaults::{
    REMOTE_DOWNLOAD_MAPPED_PATH, REMOTE_RESET_PATH, REMOTE_RUN_PIPELINE_PATH, XLSX_CONTENT_TYPE,
};
use sheetgate_protocol::{ArtifactRole, StatusEnvelope};
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::error::{is_not_found, GatewayError, Result};

/// Streamed body of the mapped result.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Acknowledgement of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAck {
    pub role: ArtifactRole,
    pub message: String,
}

/// Message reported by a successful run or reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSummary {
    pub message: String,
}

impl RemoteSummary {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Operations the gateway needs from the processing service.
#[async_trait]
pub trait RemotePipeline: Send + Sync {
    /// Upload a staged artifact to the role's endpoint.
    ///
    /// Fails with `MissingLocalFile` before any network traffic if `path`
    /// does not exist.
    async fn push_artifact(&self, path: &Path, role: ArtifactRole) -> Result<RemoteAck>;

    /// Ask the service to run the pipeline on the uploaded inputs.
    async fn trigger_run(&self) -> Result<RemoteSummary>;

    /// Stream the mapped result. A missing result is `NotFound`.
    async fn fetch_result(&self) -> Result<ByteStream>;

    /// Ask the service to delete its copies of every artifact.
    async fn reset_remote(&self) -> Result<RemoteSummary>;
}

#[async_trait]
impl<T: RemotePipeline + ?Sized> RemotePipeline for Arc<T> {
    async fn push_artifact(&self, path: &Path, role: ArtifactRole) -> Result<RemoteAck> {
        (**self).push_artifact(path, role).await
    }

    async fn trigger_run(&self) -> Result<RemoteSummary> {
        (**self).trigger_run().await
    }

    async fn fetch_result(&self) -> Result<ByteStream> {
        (**self).fetch_result().await
    }

    async fn reset_remote(&self) -> Result<RemoteSummary> {
        (**self).reset_remote().await
    }
}

// =============================================================================
// HTTP client
// =============================================================================

/// reqwest-backed client for the processing service.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: Client,
    base_url: String,
}

impl HttpRemoteClient {
    /// Build a client using the configured base URL and request timeout.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::ClientFault(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.remote_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RemotePipeline for HttpRemoteClient {
    async fn push_artifact(&self, path: &Path, role: ArtifactRole) -> Result<RemoteAck> {
        let (Some(endpoint), Some(field)) = (role.upload_endpoint(), role.field_name()) else {
            return Err(GatewayError::invalid_input(format!(
                "{} artifacts cannot be uploaded to the processing service",
                role
            )));
        };

        let len = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(GatewayError::MissingLocalFile { path: path.to_path_buf() }),
            Err(e) if is_not_found(&e) => {
                return Err(GatewayError::MissingLocalFile { path: path.to_path_buf() })
            }
            Err(e) => return Err(GatewayError::io("Failed to inspect staged file", e)),
        };
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if is_not_found(&e) => {
                return Err(GatewayError::MissingLocalFile { path: path.to_path_buf() })
            }
            Err(e) => return Err(GatewayError::io("Failed to open staged file", e)),
        };

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(role.file_name())
            .mime_str(XLSX_CONTENT_TYPE)
            .map_err(|e| GatewayError::ClientFault(format!("Invalid upload content type: {}", e)))?;
        let form = Form::new().part(field, part);

        let url = self.url(endpoint);
        info!(role = %role, url = %url, bytes = len, "Uploading artifact to processing service");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(e, "file upload"))?;

        let (status, envelope) = read_envelope(response, "file upload").await?;
        let explicit_failure = envelope.status.is_some() && !envelope.is_success();
        if !status.is_success() || explicit_failure {
            return Err(GatewayError::RemoteRejected {
                status: status.as_u16(),
                message: envelope
                    .message_or("Processing service returned an error during file upload"),
            });
        }

        debug!(role = %role, "Processing service accepted upload");
        Ok(RemoteAck {
            role,
            message: envelope.message_or("File uploaded"),
        })
    }

    async fn trigger_run(&self) -> Result<RemoteSummary> {
        let url = self.url(REMOTE_RUN_PIPELINE_PATH);
        info!(url = %url, "Triggering pipeline run");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, "pipeline run"))?;

        let (status, envelope) = read_envelope(response, "pipeline run").await?;
        if !status.is_success() {
            return Err(GatewayError::RemoteRejected {
                status: status.as_u16(),
                message: envelope.message_or("Processing service returned an error."),
            });
        }
        if !envelope.is_success() {
            return Err(GatewayError::RemotePipelineFailed {
                status: status.as_u16(),
                message: envelope
                    .message_or("An unknown error occurred in the processing pipeline."),
            });
        }
        Ok(RemoteSummary::new(envelope.message_or("")))
    }

    async fn fetch_result(&self) -> Result<ByteStream> {
        let url = self.url(REMOTE_DOWNLOAD_MAPPED_PATH);
        info!(url = %url, "Requesting mapped result");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, "download"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::not_found(
                "Mapped file not found on the processing service.",
            ));
        }
        if !status.is_success() {
            let (status, envelope) = read_envelope(response, "download").await?;
            return Err(GatewayError::RemoteRejected {
                status: status.as_u16(),
                message: envelope
                    .message_or("Processing service returned an error during download."),
            });
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                GatewayError::remote_unavailable(format!(
                    "Error occurred during file download stream: {}",
                    e
                ))
            })
        });
        Ok(stream.boxed())
    }

    async fn reset_remote(&self) -> Result<RemoteSummary> {
        let url = self.url(REMOTE_RESET_PATH);
        info!(url = %url, "Requesting processing-service reset");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, "reset"))?;

        let (status, envelope) = read_envelope(response, "reset").await?;
        if !status.is_success() || !envelope.is_success() {
            return Err(GatewayError::RemoteRejected {
                status: status.as_u16(),
                message: envelope
                    .message_or("An unknown error occurred in the processing-service reset."),
            });
        }
        Ok(RemoteSummary::new(envelope.message_or("")))
    }
}

/// Read a JSON status envelope. Bodies that are not JSON yield an empty envelope.
async fn read_envelope(response: Response, what: &str) -> Result<(StatusCode, StatusEnvelope)> {
    let status = response.status();
    let body = response.bytes().await.map_err(|e| transport_error(e, what))?;
    Ok((status, parse_envelope(&body)))
}

fn parse_envelope(body: &[u8]) -> StatusEnvelope {
    serde_json::from_slice(body).unwrap_or_default()
}

fn transport_error(err: reqwest::Error, what: &str) -> GatewayError {
    if err.is_builder() {
        return GatewayError::ClientFault(format!("Failed to build {} request: {}", what, err));
    }
    if err.is_timeout() {
        return GatewayError::remote_unavailable(format!(
            "The processing service did not respond in time ({})",
            what
        ));
    }
    GatewayError::remote_unavailable(format!(
        "The processing service is unavailable ({})",
        what
    ))
}
