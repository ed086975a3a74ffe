//! JSON bodies exchanged with gateway clients and with the processing service.
//!
//! Every non-streaming response on either side of the gateway carries a
//! `status` field (`"success"` or something else) and a human-readable
//! `message`.

use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

// ============================================================================
// Processing-service envelope
// ============================================================================

/// Response body returned by the processing service.
///
/// Unknown fields (`saved_path`, `file_size`, `deleted_files`, ...) are
/// ignored; only `status` and `message` drive the gateway's decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusEnvelope {
    /// True only when the service explicitly reported `"success"`.
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SUCCESS)
    }

    /// The reported message, or `fallback` when the service sent none.
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

// ============================================================================
// Gateway response bodies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub status: String,
    pub message: String,
}

impl MessageBody {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListBody {
    pub status: String,
    pub files: Vec<String>,
}

/// Outcome of the processing-service half of a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePhaseReport {
    pub succeeded: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetBody {
    pub status: String,
    pub message: String,
    /// Local staging entries that were deleted.
    pub removed: Vec<String>,
    pub remote: RemotePhaseReport,
}

/// Error body returned by the gateway for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    /// Machine-distinguishable error kind (`not_found`, `remote_rejected`, ...).
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}
