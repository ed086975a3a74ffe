//! SheetGate shared protocol
//!
//! Types shared between the gateway, its processing-service client and tests:
//!
//! - **Roles**: the three staged spreadsheet artifacts (`raw`, `master`, `mapped`)
//! - **Entries**: classification of names found in (or requested from) the staging directory
//! - **Envelopes**: the `{status, message}` JSON bodies exchanged over HTTP
//! - **Defaults**: canonical file names, endpoints and configuration defaults

pub mod defaults;
pub mod http_types;
pub mod paths;
pub mod types;

pub use http_types::{
    ErrorBody, FileListBody, MessageBody, RemotePhaseReport, ResetBody, StatusEnvelope,
    STATUS_ERROR, STATUS_SUCCESS,
};
pub use types::{ArtifactRole, EntryNameError, StageEntry};
