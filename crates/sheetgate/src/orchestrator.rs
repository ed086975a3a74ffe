//! Pipeline orchestration.
//!
//! Sequences the stage store and the processing-service client for the three
//! multi-step operations: running the pipeline, pulling the mapped result
//! back, and resetting both sides.

use futures::StreamExt;
use sheetgate_protocol::{ArtifactRole, RemotePhaseReport};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::remote::RemotePipeline;
use crate::stage::StageStore;

const RESET_MESSAGE: &str = "Uploaded files (excluding temporary ones) have been deleted.";
const RESET_MISSING_DIR_MESSAGE: &str =
    "Upload folder was missing or empty; ensured it exists now.";

/// Stages of a pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    ClearingOldResult,
    PushingRaw,
    PushingMaster,
    Triggering,
    Done,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Idle => "idle",
            RunStage::ClearingOldResult => "clearing_old_result",
            RunStage::PushingRaw => "pushing_raw",
            RunStage::PushingMaster => "pushing_master",
            RunStage::Triggering => "triggering",
            RunStage::Done => "done",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local copy of the mapped result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedResult {
    pub path: PathBuf,
    pub file_name: &'static str,
    pub bytes: u64,
}

/// Result of a two-phase reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    pub message: String,
    pub removed: Vec<String>,
    pub remote: RemotePhaseReport,
}

/// Coordinates the stage store and the processing service.
pub struct PipelineOrchestrator<R> {
    store: StageStore,
    remote: R,
}

impl<R: RemotePipeline> PipelineOrchestrator<R> {
    pub fn new(store: StageStore, remote: R) -> Self {
        Self { store, remote }
    }

    pub fn store(&self) -> &StageStore {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Push both inputs and trigger a run.
    ///
    /// Any previous mapped result is cleared first so a stale result is never
    /// served for new inputs. The first failing step aborts the run.
    pub async fn run_pipeline(&self) -> Result<String> {
        let mut stage = RunStage::Idle;
        debug!(stage = %stage, "Pipeline run requested");

        stage = RunStage::ClearingOldResult;
        info!(stage = %stage, "Deleting old mapped file (if it exists)");
        match self.store.remove_artifact(ArtifactRole::Mapped).await {
            Ok(true) => debug!("Old mapped file deleted"),
            Ok(false) => debug!("No old mapped file to delete"),
            Err(e) => warn!(error = %e, "Could not delete old mapped file; continuing"),
        }

        stage = RunStage::PushingRaw;
        info!(stage = %stage, "Uploading raw data file");
        self.push(ArtifactRole::Raw, stage).await?;

        stage = RunStage::PushingMaster;
        info!(stage = %stage, "Uploading master file");
        self.push(ArtifactRole::Master, stage).await?;

        stage = RunStage::Triggering;
        info!(stage = %stage, "Triggering pipeline execution");
        let summary = self.remote.trigger_run().await.map_err(|e| {
            warn!(stage = %stage, error = %e, "Pipeline run failed");
            e
        })?;

        stage = RunStage::Done;
        info!(stage = %stage, message = %summary.message, "Pipeline run completed");
        Ok(format!(
            "Pipeline executed successfully by processing service. {}",
            summary.message
        ))
    }

    async fn push(&self, role: ArtifactRole, stage: RunStage) -> Result<()> {
        let path = self.store.artifact_path(role);
        match self.remote.push_artifact(&path, role).await {
            Ok(ack) => {
                debug!(role = %role, message = %ack.message, "Upload acknowledged");
                Ok(())
            }
            Err(e) => {
                warn!(stage = %stage, role = %role, error = %e, "Upload failed; aborting run");
                Err(e)
            }
        }
    }

    /// Copy the remote mapped result into the local `mapped` artifact.
    ///
    /// The download lands in the intake area and is moved into place only
    /// once complete. On any failure the partial download is deleted, along
    /// with any earlier mapped file, before the error is returned.
    pub async fn fetch_mapped_result(&self) -> Result<MappedResult> {
        self.store.ensure_root().await?;

        let mut stream = match self.remote.fetch_result().await {
            Ok(stream) => stream,
            Err(GatewayError::NotFound(_)) => return Err(GatewayError::MappedResultNotReady),
            Err(e) => return Err(e),
        };

        let mut writer = self.store.begin_artifact(ArtifactRole::Mapped).await?;
        let path = writer.path().to_path_buf();
        let mut copied = Ok(());
        while let Some(chunk) = stream.next().await {
            copied = match chunk {
                Ok(bytes) => writer.write_chunk(&bytes).await,
                Err(e) => Err(e),
            };
            if copied.is_err() {
                break;
            }
        }
        let saved = match copied {
            Ok(()) => writer.commit().await,
            Err(e) => {
                writer.abort().await;
                Err(e)
            }
        };

        let bytes = match saved {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Mapped result download failed; removing partial file");
                if let Err(stale) = self.store.remove_artifact(ArtifactRole::Mapped).await {
                    warn!(error = %stale, "Could not delete old mapped file");
                }
                return Err(e);
            }
        };

        info!(path = %path.display(), bytes, "Mapped file saved");
        Ok(MappedResult {
            path,
            file_name: ArtifactRole::Mapped.file_name(),
            bytes,
        })
    }

    /// Reset the processing service, then the local staging directory.
    ///
    /// A failed remote phase is reported in the outcome but does not stop the
    /// local phase. Only a local failure fails the reset.
    pub async fn reset_all(&self) -> Result<ResetOutcome> {
        let remote = match self.remote.reset_remote().await {
            Ok(summary) => {
                info!(message = %summary.message, "Processing service reset");
                RemotePhaseReport {
                    succeeded: true,
                    message: summary.message,
                }
            }
            Err(e) => {
                warn!(error = %e, "Processing-service reset failed; continuing with local reset");
                RemotePhaseReport {
                    succeeded: false,
                    message: e.public_message(),
                }
            }
        };

        let intake = self.store.intake_dir_name().to_string();
        match self.store.purge(&[intake.as_str()]).await {
            Ok(summary) => {
                info!(removed = summary.count(), "Staging directory reset");
                Ok(ResetOutcome {
                    message: RESET_MESSAGE.to_string(),
                    removed: summary.removed,
                    remote,
                })
            }
            Err(e) if e.is_missing_path() => {
                warn!(path = %self.store.root().display(), "Staging directory missing during reset; recreating");
                self.store.ensure_root().await?;
                Ok(ResetOutcome {
                    message: RESET_MISSING_DIR_MESSAGE.to_string(),
                    removed: Vec::new(),
                    remote,
                })
            }
            Err(e) => Err(e),
        }
    }
}
