//! Tracing configuration and log routing.
//!
//! Logs go to stdout with a compact formatter and to a file. `DOCDIGEST_LOG_FILE` selects the
//! file to append to; otherwise `logs/docdigest.log` is used. The file layer writes through a
//! non-blocking worker so request handlers never wait on disk.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "DOCDIGEST_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "docdigest.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// `RUST_LOG` controls filtering and defaults to `info`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Returns `None` when the log file cannot be opened; stdout logging still works.
fn configure_file_writer() -> Option<NonBlocking> {
    let configured = std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty());

    match configured {
        Some(path) => {
            if let Some(parent) = Path::new(&path).parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    eprintln!("Failed to create log directory {}: {err}", parent.display());
                    return None;
                }
            }
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
            {
                Ok(file) => Some(install(tracing_appender::non_blocking(file))),
                Err(err) => {
                    eprintln!("Failed to open log file {path}: {err}");
                    None
                }
            }
        }
        None => {
            if let Err(err) = std::fs::create_dir_all(DEFAULT_LOG_DIR) {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            let appender = tracing_appender::rolling::never(DEFAULT_LOG_DIR, DEFAULT_LOG_FILE);
            Some(install(tracing_appender::non_blocking(appender)))
        }
    }
}

fn install((writer, guard): (NonBlocking, WorkerGuard)) -> NonBlocking {
    let _ = LOG_GUARD.set(guard);
    writer
}
