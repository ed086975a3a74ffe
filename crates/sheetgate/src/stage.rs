//! Local stage store.
//!
//! One staging directory holds at most one file per [`ArtifactRole`] plus the
//! reserved intake subdirectory where uploads land before promotion. Role
//! files are replaced by rename, so a reader never observes a half-moved
//! upload.

use sheetgate_protocol::{ArtifactRole, StageEntry};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{is_not_found, GatewayError, PurgeFailure, Result};

const INTAKE_FORBIDDEN_MESSAGE: &str = "Access to temporary files is restricted.";

/// Names removed by a purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub removed: Vec<String>,
}

impl PurgeSummary {
    pub fn count(&self) -> usize {
        self.removed.len()
    }
}

/// Staging directory manager.
#[derive(Debug, Clone)]
pub struct StageStore {
    root: PathBuf,
    intake_dir_name: String,
}

impl StageStore {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            root: config.staging_dir.clone(),
            intake_dir_name: config.intake_dir_name.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn intake_dir_name(&self) -> &str {
        &self.intake_dir_name
    }

    pub fn intake_dir(&self) -> PathBuf {
        self.root.join(&self.intake_dir_name)
    }

    /// Canonical path of a role's artifact (whether or not it exists).
    pub fn artifact_path(&self, role: ArtifactRole) -> PathBuf {
        self.root.join(role.file_name())
    }

    /// Create the staging directory if it is missing.
    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            GatewayError::io(
                format!("Failed to create staging directory {}", self.root.display()),
                e,
            )
        })
    }

    /// Create the intake directory if it is missing and return its path.
    pub async fn ensure_intake(&self) -> Result<PathBuf> {
        let dir = self.intake_dir();
        fs::create_dir_all(&dir).await.map_err(|e| {
            GatewayError::io(
                format!("Failed to create intake directory {}", dir.display()),
                e,
            )
        })?;
        Ok(dir)
    }

    /// Fresh, unique intake path for an upload arriving on `field`.
    ///
    /// The original file's extension is kept so later validation and
    /// debugging can tell what arrived.
    pub fn new_intake_path(&self, field: &str, original_name: &str) -> PathBuf {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        self.intake_dir()
            .join(format!("{}-{}{}", field, Uuid::new_v4().simple(), ext))
    }

    /// Move an intake file into place as the artifact for `role`.
    ///
    /// Any previous artifact for the role is replaced.
    pub async fn promote(&self, temp_path: &Path, role: ArtifactRole) -> Result<PathBuf> {
        if !role.is_uploadable() {
            return Err(GatewayError::invalid_input(format!(
                "{} artifacts are produced by the pipeline and cannot be uploaded",
                role
            )));
        }

        match fs::metadata(temp_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(GatewayError::not_found("No file uploaded.")),
            Err(e) if is_not_found(&e) => return Err(GatewayError::not_found("No file uploaded.")),
            Err(e) => return Err(GatewayError::io("Failed to inspect uploaded file", e)),
        }

        self.ensure_root().await?;
        let final_path = self.artifact_path(role);
        fs::rename(temp_path, &final_path).await.map_err(|e| {
            GatewayError::io(format!("Failed to store {}", role.file_name()), e)
        })?;

        info!(role = %role, path = %final_path.display(), "Promoted upload");
        Ok(final_path)
    }

    /// Names of every entry in the staging directory, sorted.
    ///
    /// A missing staging directory is created and reported as empty.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if is_not_found(&e) => {
                self.ensure_root().await?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(GatewayError::io("Failed to list staged files", e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| GatewayError::io("Failed to list staged files", e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// [`list`](Self::list) without the intake directory.
    pub async fn list_visible(&self) -> Result<Vec<String>> {
        let names = self.list().await?;
        Ok(names
            .into_iter()
            .filter(|name| {
                !matches!(
                    StageEntry::classify(name, &self.intake_dir_name),
                    Ok(StageEntry::Intake)
                )
            })
            .collect())
    }

    /// Resolve a requested file name to a staged file.
    ///
    /// Anything in the intake area is `Forbidden` whether or not it exists.
    pub async fn locate(&self, name: &str) -> Result<PathBuf> {
        if StageEntry::classify(name, &self.intake_dir_name)?.is_intake() {
            return Err(GatewayError::forbidden(INTAKE_FORBIDDEN_MESSAGE));
        }

        let path = self.root.join(name);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(GatewayError::not_found("File not found.")),
            Err(e) if is_not_found(&e) => Err(GatewayError::not_found("File not found.")),
            Err(e) => Err(GatewayError::io("Failed to access staged file", e)),
        }
    }

    /// Delete a role's artifact. Returns whether a file was removed.
    pub async fn remove_artifact(&self, role: ArtifactRole) -> Result<bool> {
        let path = self.artifact_path(role);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(GatewayError::io(
                format!("Failed to delete {}", role.file_name()),
                e,
            )),
        }
    }

    /// Delete every staging entry whose name is not in `exclude`.
    ///
    /// Entries are removed concurrently and recursively. All deletions are
    /// attempted; failures are reported together afterwards. A missing
    /// staging directory is an `Io` error with a not-found source.
    pub async fn purge(&self, exclude: &[&str]) -> Result<PurgeSummary> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| GatewayError::io("Failed to read staging directory", e))?;

        let mut tasks: JoinSet<(String, io::Result<bool>)> = JoinSet::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| GatewayError::io("Failed to read staging directory", e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if exclude.contains(&name.as_str()) {
                debug!(entry = %name, "Skipping excluded entry");
                continue;
            }
            let path = entry.path();
            tasks.spawn(async move {
                let result = remove_entry(&path).await;
                (name, result)
            });
        }

        let mut summary = PurgeSummary::default();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(true))) => summary.removed.push(name),
                Ok((_, Ok(false))) => {}
                Ok((name, Err(error))) => {
                    warn!(entry = %name, error = %error, "Failed to delete staging entry");
                    failures.push(PurgeFailure { name, error });
                }
                Err(join_err) => failures.push(PurgeFailure {
                    name: "<unknown>".to_string(),
                    error: io::Error::other(join_err.to_string()),
                }),
            }
        }

        if !failures.is_empty() {
            return Err(GatewayError::Purge { failures });
        }
        summary.removed.sort();
        Ok(summary)
    }

    /// Remove leftover intake files from a previous process.
    pub async fn sweep_intake(&self) -> Result<usize> {
        let intake = self.ensure_intake().await?;
        let mut dir = fs::read_dir(&intake)
            .await
            .map_err(|e| GatewayError::io("Failed to read intake directory", e))?;

        let mut removed = 0;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| GatewayError::io("Failed to read intake directory", e))?
        {
            match remove_entry(&entry.path()).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to sweep intake entry"),
            }
        }
        Ok(removed)
    }

    /// Open a writer that will replace the artifact for a pipeline-produced
    /// `role` once committed.
    pub async fn begin_artifact(&self, role: ArtifactRole) -> Result<ArtifactWriter> {
        if role.is_uploadable() {
            return Err(GatewayError::invalid_input(format!(
                "{} artifacts arrive by upload and are promoted, not written",
                role
            )));
        }
        self.ensure_intake().await?;
        let temp_path = self.new_intake_path(role.as_str(), role.file_name());
        ArtifactWriter::create(temp_path, self.artifact_path(role)).await
    }

    /// Best-effort removal of an intake file that will not be promoted.
    pub async fn discard(&self, temp_path: &Path) {
        if let Err(e) = fs::remove_file(temp_path).await {
            if !is_not_found(&e) {
                warn!(path = %temp_path.display(), error = %e, "Failed to discard intake file");
            }
        }
    }
}

async fn remove_entry(path: &Path) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if is_not_found(&e) => return Ok(false),
        Err(e) => return Err(e),
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Artifact writer
// ============================================================================

/// Scoped writer for an artifact produced by the gateway.
///
/// Bytes go to a scratch file in the intake area and only replace the
/// artifact when [`commit`](Self::commit) moves them into place, so readers
/// see either the previous file or the complete new one. Call
/// [`abort`](Self::abort) on failure paths; dropping an uncommitted writer
/// also removes the scratch file.
#[derive(Debug)]
pub struct ArtifactWriter {
    temp_path: PathBuf,
    dest: PathBuf,
    file: Option<fs::File>,
    written: u64,
    finished: bool,
}

impl ArtifactWriter {
    pub async fn create(temp_path: PathBuf, dest: PathBuf) -> Result<Self> {
        let file = fs::File::create(&temp_path).await.map_err(|e| {
            GatewayError::io(format!("Failed to create {}", temp_path.display()), e)
        })?;
        Ok(Self {
            temp_path,
            dest,
            file: Some(file),
            written: 0,
            finished: false,
        })
    }

    /// Final location of the artifact.
    pub fn path(&self) -> &Path {
        &self.dest
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| GatewayError::internal("artifact writer already closed"))?;
        file.write_all(chunk)
            .await
            .map_err(|e| GatewayError::io("Failed to save the downloaded mapped file.", e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush, then move the scratch file onto the artifact path. Returns the
    /// number of bytes written.
    pub async fn commit(mut self) -> Result<u64> {
        if let Some(mut file) = self.file.take() {
            let synced = match file.flush().await {
                Ok(()) => file.sync_all().await,
                Err(e) => Err(e),
            };
            drop(file);
            if let Err(e) = synced {
                self.remove_scratch().await;
                return Err(GatewayError::io("Failed to save the downloaded mapped file.", e));
            }
        }

        if let Err(e) = fs::rename(&self.temp_path, &self.dest).await {
            self.remove_scratch().await;
            return Err(GatewayError::io("Failed to save the downloaded mapped file.", e));
        }
        self.finished = true;
        debug!(path = %self.dest.display(), bytes = self.written, "Artifact moved into place");
        Ok(self.written)
    }

    /// Close and delete the scratch file. The artifact path is untouched.
    pub async fn abort(mut self) {
        self.file.take();
        self.remove_scratch().await;
    }

    async fn remove_scratch(&mut self) {
        // Marked finished so Drop does not try again.
        self.finished = true;
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            if !is_not_found(&e) {
                warn!(path = %self.temp_path.display(), error = %e, "Failed to clean up partial artifact");
            }
        }
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.file.take();
        if let Err(e) = std::fs::remove_file(&self.temp_path) {
            if !is_not_found(&e) {
                warn!(path = %self.temp_path.display(), error = %e, "Failed to clean up partial artifact");
            }
        }
    }
}
