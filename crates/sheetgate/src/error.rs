//! Error types for the gateway core.
//!
//! Every failure carries a machine-distinguishable [`ErrorKind`] and an HTTP
//! status derived from it. Processing-service statuses are preserved when
//! they are real error codes.

use sheetgate_protocol::EntryNameError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Gateway operation result type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Coarse error classification exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Forbidden,
    NotFound,
    RemoteUnavailable,
    RemoteRejected,
    IoFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::RemoteRejected => "remote_rejected",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A staging entry that `purge` could not delete.
#[derive(Debug)]
pub struct PurgeFailure {
    pub name: String,
    pub error: io::Error,
}

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing upload, bad file name, unsupported file type
    #[error("{0}")]
    InvalidInput(String),

    /// Request targets the reserved intake area
    #[error("{0}")]
    Forbidden(String),

    /// Staged artifact or remote resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// A staged input the pipeline needs is absent locally
    #[error("Required file not found on gateway: {}", display_file_name(.path))]
    MissingLocalFile { path: PathBuf },

    /// The processing service has no mapped result yet
    #[error("Mapped file not found on the processing service. Please run the pipeline first.")]
    MappedResultNotReady,

    /// No response from the processing service (connect failure, timeout, broken stream)
    #[error("{message}")]
    RemoteUnavailable { message: String },

    /// The processing service answered with an application-level error
    #[error("{message}")]
    RemoteRejected { status: u16, message: String },

    /// The processing service ran the pipeline and reported a non-success status
    #[error("{message}")]
    RemotePipelineFailed { status: u16, message: String },

    /// The outbound request could not be constructed
    #[error("{0}")]
    ClientFault(String),

    /// Local filesystem operation failed unexpectedly
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// One or more staging entries survived a purge
    #[error("Failed to reset uploaded files: {}", summarize_failures(.failures))]
    Purge { failures: Vec<PurgeFailure> },

    /// Unanticipated failure
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn remote_unavailable(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: msg.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for a local I/O failure caused by a path that does not exist.
    pub fn is_missing_path(&self) -> bool {
        matches!(self, GatewayError::Io { source, .. } if is_not_found(source))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidInput(_) => ErrorKind::InvalidInput,
            GatewayError::Forbidden(_) => ErrorKind::Forbidden,
            GatewayError::NotFound(_)
            | GatewayError::MissingLocalFile { .. }
            | GatewayError::MappedResultNotReady => ErrorKind::NotFound,
            GatewayError::RemoteUnavailable { .. } => ErrorKind::RemoteUnavailable,
            GatewayError::RemoteRejected { .. } | GatewayError::RemotePipelineFailed { .. } => {
                ErrorKind::RemoteRejected
            }
            GatewayError::Io { .. } | GatewayError::Purge { .. } => ErrorKind::IoFailure,
            GatewayError::ClientFault(_) | GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status to report at the boundary.
    ///
    /// Remote statuses pass through when they are 4xx/5xx; anything else a
    /// failed remote call reported (including a 200 with an error body) is 500.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RemoteRejected { status, .. }
            | GatewayError::RemotePipelineFailed { status, .. } => {
                if (400..=599).contains(status) {
                    *status
                } else {
                    500
                }
            }
            _ => match self.kind() {
                ErrorKind::InvalidInput => 400,
                ErrorKind::Forbidden => 403,
                ErrorKind::NotFound => 404,
                ErrorKind::RemoteUnavailable => 503,
                ErrorKind::RemoteRejected
                | ErrorKind::IoFailure
                | ErrorKind::Internal => 500,
            },
        }
    }

    /// Message safe to return to clients. Internal details of local I/O
    /// failures stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Io { context, .. } => context.clone(),
            GatewayError::Purge { .. } => "Failed to reset uploaded files.".to_string(),
            GatewayError::ClientFault(_) => {
                "Failed to communicate with the processing service.".to_string()
            }
            GatewayError::Internal(_) => "An unexpected error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<EntryNameError> for GatewayError {
    fn from(err: EntryNameError) -> Self {
        GatewayError::InvalidInput(err.to_string())
    }
}

/// True when an I/O error only means "there was nothing there".
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

fn display_file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn summarize_failures(failures: &[PurgeFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.name, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}
