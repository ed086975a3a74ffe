//! SheetGate: spreadsheet staging gateway.
//!
//! Clients upload a raw data sheet and a master sheet, trigger a remote
//! mapping pipeline, and download the mapped result. The gateway keeps one
//! copy of each artifact in a local staging directory and relays them to the
//! processing service.

pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod remote;
pub mod stage;

pub use config::{ConfigError, GatewayArgs, GatewayConfig};
pub use error::{ErrorKind, GatewayError, PurgeFailure, Result};
pub use http::{router, serve, ApiError, AppState};
pub use orchestrator::{MappedResult, PipelineOrchestrator, ResetOutcome, RunStage};
pub use remote::{ByteStream, HttpRemoteClient, RemoteAck, RemotePipeline, RemoteSummary};
pub use stage::{ArtifactWriter, PurgeSummary, StageStore};
