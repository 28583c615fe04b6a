use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "protest_transition=info";

/// Initializes the logging system with both console and file output.
///
/// The file layer writes JSON lines to a daily rolling file in `directory`.
/// `RUST_LOG` overrides the default filter. Hold the returned guard until
/// exit; dropping it flushes the buffered file lines.
#[must_use = "dropping the guard stops the file writer"]
pub fn init_logging(directory: &Path, file_name: &str) -> WorkerGuard {
    let _ = fs::create_dir_all(directory);

    let file_appender = tracing_appender::rolling::daily(directory, file_name);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}
