mod aggregate;
mod bundle;
mod config;
mod db;
mod error;
mod grading;
mod ipc;
mod logging;
mod model;
mod ranking;
mod report;
mod store;

use std::io::{self, BufRead, Write};

fn main() {
    let cfg = config::DaemonConfig::from_env();
    logging::init(cfg.log_filter.as_deref());
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gradebookd starting");

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        // A bad startup workspace is not fatal; the client can still select one.
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::warn!(workspace = %path.to_string_lossy(), error = %e, "startup workspace not opened");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // No id to echo back.
            Err(e) => ipc::err("", "bad_json", e.to_string(), None),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("gradebookd exiting");
}
