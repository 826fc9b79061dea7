//! Process-level settings read from the environment.
//!
//! Per-workspace settings (school profile, report options) live in the
//! workspace database; see `ipc::handlers::setup`.

use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "GRADEBOOKD_WORKSPACE";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaemonConfig {
    /// Workspace opened at startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            workspace: non_empty(WORKSPACE_ENV).map(PathBuf::from),
            log_filter: non_empty(crate::logging::LOG_ENV),
        }
    }
}
