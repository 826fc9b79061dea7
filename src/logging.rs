//! Diagnostics go to stderr; stdout carries the IPC protocol.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GRADEBOOKD_LOG";

pub fn init(filter: Option<&str>) {
    let filter = filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .try_init();
    if let Err(e) = result {
        eprintln!("gradebookd: logging already initialised: {e}");
    }
}
