//! Gateway configuration.
//!
//! Built once at process start and handed to the stage store, the
//! processing-service client and the HTTP layer. Nothing in the core reads
//! the environment after this point.
//!
//! Priority: CLI flag > `SHEETGATE_*` variable > legacy variable (`PORT`,
//! `PYTHON_API_BASE_URL`) > default. A `.env` file is loaded into the
//! environment by the binary before parsing.

use sheetgate_protocol::defaults::{
    DEFAULT_BIND_ADDR, DEFAULT_INTAKE_DIR_NAME, DEFAULT_MAX_UPLOAD_MB, DEFAULT_REMOTE_BASE_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use sheetgate_protocol::paths::{absolutize, default_staging_dir};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("processing service URL must start with http:// or https://: '{0}'")]
    InvalidRemoteUrl(String),
    #[error("invalid bind address '{0}'")]
    InvalidBindAddr(String),
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("maximum upload size must be greater than zero")]
    ZeroUploadLimit,
    #[error("intake directory name must be a single plain path component: '{0}'")]
    InvalidIntakeDir(String),
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address the HTTP gateway listens on
    pub bind_addr: String,
    /// Base URL of the processing service (no trailing slash)
    pub remote_base_url: String,
    /// Absolute staging directory holding the role artifacts
    pub staging_dir: PathBuf,
    /// Name of the reserved intake subdirectory inside `staging_dir`
    pub intake_dir_name: String,
    /// Transport timeout applied to every processing-service call
    pub request_timeout: Duration,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: u64,
    /// Directory for rolling log files (console only when `None`)
    pub log_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            staging_dir: default_staging_dir(),
            intake_dir_name: DEFAULT_INTAKE_DIR_NAME.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            log_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Configuration rooted at `staging_dir`, everything else defaulted.
    pub fn with_staging_dir(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: absolutize(staging_dir.into()),
            ..Self::default()
        }
    }

    pub fn with_remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.remote_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Resolve CLI arguments against the environment.
    pub fn from_args(args: &GatewayArgs) -> Result<Self, ConfigError> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    /// Resolve CLI arguments using `lookup` for legacy variables.
    pub fn resolve(
        args: &GatewayArgs,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match (&args.bind, lookup("PORT")) {
            (Some(bind), _) => bind.clone(),
            (None, Some(port)) if !port.trim().is_empty() => format!("0.0.0.0:{}", port.trim()),
            _ => defaults.bind_addr,
        };

        let remote_base_url = args
            .remote_url
            .clone()
            .or_else(|| lookup("PYTHON_API_BASE_URL"))
            .unwrap_or(defaults.remote_base_url);

        let config = Self {
            bind_addr,
            remote_base_url: remote_base_url.trim().trim_end_matches('/').to_string(),
            staging_dir: args
                .staging_dir
                .clone()
                .map(absolutize)
                .unwrap_or(defaults.staging_dir),
            intake_dir_name: args.intake_dir.clone(),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
            log_dir: args.log_dir.clone().map(absolutize),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.remote_base_url.as_str();
        let host = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .unwrap_or_default();
        if host.is_empty() {
            return Err(ConfigError::InvalidRemoteUrl(self.remote_base_url.clone()));
        }
        let bind_ok = match self.bind_addr.rsplit_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        };
        if !bind_ok {
            return Err(ConfigError::InvalidBindAddr(self.bind_addr.clone()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        let intake = self.intake_dir_name.as_str();
        if intake.is_empty()
            || intake == "."
            || intake == ".."
            || intake.contains(&['/', '\\', ':'][..])
        {
            return Err(ConfigError::InvalidIntakeDir(self.intake_dir_name.clone()));
        }
        Ok(())
    }
}

/// Command-line arguments for the gateway binary.
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "sheetgate", about = "Spreadsheet staging gateway for a remote mapping pipeline")]
pub struct GatewayArgs {
    /// Address to listen on (falls back to 0.0.0.0:$PORT)
    #[arg(long, env = "SHEETGATE_BIND")]
    pub bind: Option<String>,

    /// Processing service base URL (falls back to $PYTHON_API_BASE_URL)
    #[arg(long, env = "SHEETGATE_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Staging directory for uploaded and mapped spreadsheets
    #[arg(long, env = "SHEETGATE_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Name of the intake subdirectory for in-flight uploads
    #[arg(long, env = "SHEETGATE_INTAKE_DIR", default_value = DEFAULT_INTAKE_DIR_NAME)]
    pub intake_dir: String,

    /// Timeout for processing-service requests, in seconds
    #[arg(long, env = "SHEETGATE_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Maximum upload size, in MiB
    #[arg(long, env = "SHEETGATE_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    pub max_upload_mb: u64,

    /// Write rolling log files to this directory
    #[arg(long, env = "SHEETGATE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
