use std::io;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// `RUST_LOG` when set, `default_level` otherwise
fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy()
}

/// Initialise tracing to stderr only
pub fn init(default_level: Level) {
    let console_layer = fmt::layer().with_writer(io::stderr).with_target(true).with_line_number(true).with_ansi(true).compact();

    tracing_subscriber::registry().with(env_filter(default_level)).with(console_layer).init();
}

/// Initialise tracing to stderr and to an hourly rolling file in `log_dir`
///
/// The guard flushes the file writer on drop and must outlive every log call.
pub fn init_with_file(app_name: &str, log_dir: &str, default_level: Level) -> WorkerGuard {
    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::hourly(log_dir, format!("{app_name}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer =
        fmt::layer().with_writer(non_blocking).with_target(true).with_thread_ids(true).with_line_number(true).with_ansi(false).compact();

    // stdout carries the probe's JSON output
    let console_layer = fmt::layer().with_writer(io::stderr).with_target(true).with_line_number(true).with_ansi(true).compact();

    tracing_subscriber::registry().with(env_filter(default_level)).with(file_layer).with(console_layer).init();

    guard
}
