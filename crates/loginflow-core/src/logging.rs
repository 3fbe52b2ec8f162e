//! Tracing setup.
//!
//! Level resolution: `LOGINFLOW_LOG` (full `EnvFilter` syntax) first, then the
//! configured `log.level`. Output goes to stderr so stdout stays clean for
//! command output, or to `log.file` when one is configured.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "LOGINFLOW_LOG";

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
///
/// # Errors
/// Returns an error if the filter is malformed, the log file cannot be
/// opened, or a global subscriber is already installed.
pub fn init(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(std::env::var(LOG_ENV).ok().as_deref(), &config.log.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.log_file() {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| std::path::PathBuf::from("."), std::path::Path::to_path_buf);
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(&dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Failed to install tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

fn build_filter(env_directive: Option<&str>, configured_level: &str) -> Result<EnvFilter> {
    let directive = env_directive
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(configured_level);
    EnvFilter::try_new(directive).with_context(|| format!("Invalid log filter: {directive}"))
}
