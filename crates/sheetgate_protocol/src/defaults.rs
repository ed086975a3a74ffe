//! Canonical default values shared by the gateway and its clients.

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_REMOTE_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_STAGING_DIR: &str = "uploads";
pub const DEFAULT_INTAKE_DIR_NAME: &str = "temp";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 16;

/// Spreadsheet extensions accepted on upload (compared case-insensitively).
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["xlsx", "xls"];

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// Processing-service endpoints (relative to the remote base URL).
pub const REMOTE_RUN_PIPELINE_PATH: &str = "/run_pipeline";
pub const REMOTE_DOWNLOAD_MAPPED_PATH: &str = "/download_mapped";
pub const REMOTE_RESET_PATH: &str = "/reset";
