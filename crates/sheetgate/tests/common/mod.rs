//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use sheetgate::error::is_not_found;
use sheetgate::{
    ByteStream, GatewayConfig, GatewayError, RemoteAck, RemotePipeline, RemoteSummary, Result,
    StageStore,
};
use sheetgate_protocol::ArtifactRole;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Failure a [`MockRemote`] operation should report.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Rejected(u16, &'static str),
    Unavailable,
    NotFound,
    /// The service call panics instead of returning.
    Panic,
}

impl MockFailure {
    fn to_error(&self) -> GatewayError {
        match self {
            MockFailure::Rejected(status, message) => GatewayError::RemoteRejected {
                status: *status,
                message: message.to_string(),
            },
            MockFailure::Unavailable => {
                GatewayError::remote_unavailable("The processing service is unavailable")
            }
            MockFailure::NotFound => GatewayError::not_found("Mapped file not found"),
            MockFailure::Panic => panic!("processing service mock panicked"),
        }
    }
}

/// What `fetch_result` streams back.
#[derive(Debug, Clone)]
pub enum FetchScript {
    Chunks(Vec<&'static [u8]>),
    /// Yield the chunks, then a transport failure.
    FailAfter(Vec<&'static [u8]>),
    /// Yield `first`, wait for `gate` to be notified, then yield `rest`.
    Gated {
        first: &'static [u8],
        gate: Arc<Notify>,
        rest: &'static [u8],
    },
    Fail(MockFailure),
}

/// Record of a call made against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Push { role: ArtifactRole, bytes: usize },
    Run,
    Fetch,
    Reset,
}

/// In-process processing service with scripted outcomes.
pub struct MockRemote {
    push_failures: Mutex<HashMap<ArtifactRole, MockFailure>>,
    run_result: Mutex<std::result::Result<&'static str, MockFailure>>,
    fetch_script: Mutex<FetchScript>,
    reset_result: Mutex<std::result::Result<&'static str, MockFailure>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            push_failures: Mutex::new(HashMap::new()),
            run_result: Mutex::new(Ok("ok")),
            fetch_script: Mutex::new(FetchScript::Chunks(vec![&b"12345"[..]])),
            reset_result: Mutex::new(Ok("All files deleted")),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_push(&self, role: ArtifactRole, failure: MockFailure) {
        self.push_failures.lock().unwrap().insert(role, failure);
    }

    pub fn set_run_result(&self, result: std::result::Result<&'static str, MockFailure>) {
        *self.run_result.lock().unwrap() = result;
    }

    pub fn set_fetch_script(&self, script: FetchScript) {
        *self.fetch_script.lock().unwrap() = script;
    }

    pub fn set_reset_result(&self, result: std::result::Result<&'static str, MockFailure>) {
        *self.reset_result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_count(&self, role: ArtifactRole) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RemoteCall::Push { role: r, .. } if *r == role))
            .count()
    }

    pub fn run_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == RemoteCall::Run)
            .count()
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemotePipeline for MockRemote {
    async fn push_artifact(&self, path: &Path, role: ArtifactRole) -> Result<RemoteAck> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if is_not_found(&e) => {
                return Err(GatewayError::MissingLocalFile {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(GatewayError::io("mock read failed", e)),
        };
        self.record(RemoteCall::Push {
            role,
            bytes: bytes.len(),
        });

        if let Some(failure) = self.push_failures.lock().unwrap().get(&role) {
            return Err(failure.to_error());
        }
        Ok(RemoteAck {
            role,
            message: format!("{} received", role),
        })
    }

    async fn trigger_run(&self) -> Result<RemoteSummary> {
        self.record(RemoteCall::Run);
        match &*self.run_result.lock().unwrap() {
            Ok(message) => Ok(RemoteSummary::new(*message)),
            Err(failure) => Err(failure.to_error()),
        }
    }

    async fn fetch_result(&self) -> Result<ByteStream> {
        self.record(RemoteCall::Fetch);
        let script = self.fetch_script.lock().unwrap().clone();
        match script {
            FetchScript::Chunks(chunks) => Ok(stream::iter(
                chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
            )
            .boxed()),
            FetchScript::FailAfter(chunks) => {
                let failure = stream::once(async {
                    Err(GatewayError::remote_unavailable(
                        "Error occurred during file download stream",
                    ))
                });
                Ok(stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))))
                    .chain(failure)
                    .boxed())
            }
            FetchScript::Gated { first, gate, rest } => {
                let tail = stream::once(async move {
                    gate.notified().await;
                    Ok(Bytes::from_static(rest))
                });
                Ok(stream::iter(std::iter::once(Ok(Bytes::from_static(first))))
                    .chain(tail)
                    .boxed())
            }
            FetchScript::Fail(failure) => Err(failure.to_error()),
        }
    }

    async fn reset_remote(&self) -> Result<RemoteSummary> {
        self.record(RemoteCall::Reset);
        match &*self.reset_result.lock().unwrap() {
            Ok(message) => Ok(RemoteSummary::new(*message)),
            Err(failure) => Err(failure.to_error()),
        }
    }
}

/// Stage store rooted in a fresh `uploads` directory under `dir`.
pub fn store_in(dir: &Path) -> StageStore {
    StageStore::new(&GatewayConfig::with_staging_dir(dir.join("uploads")))
}

/// Stage `bytes` as the artifact for `role` through the intake area.
pub async fn stage_artifact(store: &StageStore, role: ArtifactRole, bytes: &[u8]) -> PathBuf {
    store.ensure_intake().await.unwrap();
    let field = role.field_name().unwrap_or("artifact");
    let temp = store.new_intake_path(field, "upload.xlsx");
    tokio::fs::write(&temp, bytes).await.unwrap();
    store.promote(&temp, role).await.unwrap()
}

/// Wait until a file of at least `len` bytes shows up in the intake area.
pub async fn wait_for_intake_bytes(store: &StageStore, len: u64) -> PathBuf {
    for _ in 0..500 {
        if let Ok(mut dir) = tokio::fs::read_dir(store.intake_dir()).await {
            while let Some(entry) = dir.next_entry().await.unwrap() {
                let meta = entry.metadata().await.unwrap();
                if meta.len() >= len {
                    return entry.path();
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no intake file reached {len} bytes");
}

/// True when the intake area holds no entries.
pub async fn intake_is_empty(store: &StageStore) -> bool {
    let mut dir = tokio::fs::read_dir(store.intake_dir()).await.unwrap();
    dir.next_entry().await.unwrap().is_none()
}

/// Serve `app` on an ephemeral localhost port.
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
