//! Artifact roles and staging-entry classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Artifact roles
// ============================================================================

/// Role of a staged spreadsheet artifact.
///
/// At most one artifact exists per role. `Raw` and `Master` arrive from client
/// uploads; `Mapped` is only ever written by a completed pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Raw,
    Master,
    Mapped,
}

impl ArtifactRole {
    pub const ALL: [ArtifactRole; 3] = [ArtifactRole::Raw, ArtifactRole::Master, ArtifactRole::Mapped];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactRole::Raw => "raw",
            ArtifactRole::Master => "master",
            ArtifactRole::Mapped => "mapped",
        }
    }

    /// Canonical file name inside the staging directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactRole::Raw => "raw_data.xlsx",
            ArtifactRole::Master => "master_file.xlsx",
            ArtifactRole::Mapped => "mapped_data.xlsx",
        }
    }

    /// Multipart field name used both by gateway clients and by the
    /// processing service. `Mapped` is never uploaded and has none.
    pub fn field_name(&self) -> Option<&'static str> {
        match self {
            ArtifactRole::Raw => Some("raw_data"),
            ArtifactRole::Master => Some("master_file"),
            ArtifactRole::Mapped => None,
        }
    }

    /// Processing-service endpoint accepting this role's file.
    pub fn upload_endpoint(&self) -> Option<&'static str> {
        match self {
            ArtifactRole::Raw => Some("/upload_raw"),
            ArtifactRole::Master => Some("/upload_master"),
            ArtifactRole::Mapped => None,
        }
    }

    /// Whether a client may supply this role directly.
    pub fn is_uploadable(&self) -> bool {
        !matches!(self, ArtifactRole::Mapped)
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.file_name() == name)
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Staging entries
// ============================================================================

const PATH_SEPARATORS: &[char] = &['/', '\\'];

/// What a name in the staging directory refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEntry<'a> {
    /// One of the canonical role files.
    Artifact(ArtifactRole),
    /// The reserved intake directory or anything nested under it.
    Intake,
    /// Any other single-component name.
    Other(&'a str),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryNameError {
    #[error("file name cannot be empty")]
    Empty,
    #[error("file name must not contain parent or root components: {0}")]
    Traversal(String),
    #[error("file name must not contain path separators: {0}")]
    Nested(String),
}

impl<'a> StageEntry<'a> {
    /// Classify a requested name relative to the staging directory.
    ///
    /// The intake check runs on the first path component before anything
    /// else, so `temp`, `temp/x`, `temp\x` and `./temp/x` are always
    /// `Intake`, while a sibling such as `temp_old` is an ordinary entry.
    pub fn classify(name: &'a str, intake_dir_name: &str) -> Result<Self, EntryNameError> {
        if name.is_empty() {
            return Err(EntryNameError::Empty);
        }

        let mut components = name.split(PATH_SEPARATORS).skip_while(|c| *c == ".");
        let first = components.next().unwrap_or_default();
        if first == intake_dir_name {
            return Ok(StageEntry::Intake);
        }

        if first.is_empty() || name.split(PATH_SEPARATORS).any(|c| c == ".." || c == ".") {
            return Err(EntryNameError::Traversal(name.to_string()));
        }
        if components.next().is_some() || first.contains(':') {
            return Err(EntryNameError::Nested(name.to_string()));
        }

        Ok(match ArtifactRole::from_file_name(name) {
            Some(role) => StageEntry::Artifact(role),
            None => StageEntry::Other(name),
        })
    }

    pub fn is_intake(&self) -> bool {
        matches!(self, StageEntry::Intake)
    }
}
