//! Shared logging utilities for SheetGate binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "sheetgate=info";
const VERBOSE_LOG_FILTER: &str = "sheetgate=debug,sheetgate_protocol=debug";
const MAX_LOG_FILES: usize = 5;

/// Logging configuration shared by SheetGate binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Directory for daily rolling log files. Console only when `None`.
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with stderr output and an optional rolling file writer.
///
/// `RUST_LOG` overrides the default filter for both outputs.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let console_filter = build_filter(config.verbose);

    let file_layer = match &config.log_dir {
        Some(dir) => {
            let appender = file_appender(dir.clone(), config.app_name)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_filter(build_filter(config.verbose)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(VERBOSE_LOG_FILTER)
        } else {
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }
    })
}

fn file_appender(dir: PathBuf, app_name: &str) -> Result<RollingFileAppender> {
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(&dir)
        .with_context(|| format!("Failed to open log file for {}", app_name))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("sheetgate"), "sheetgate");
        assert_eq!(sanitize_name("sheet gate/v1"), "sheet_gate_v1");
    }

    #[test]
    fn test_file_appender_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs").join("nested");
        file_appender(dir.clone(), "sheetgate").unwrap();
        assert!(dir.is_dir());
    }
}
