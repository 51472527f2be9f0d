use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] reportsync_sync::SyncError),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },

    #[error("ctrl-c handler failed: {0}")]
    Signal(String),

    #[error("interval must be greater than zero")]
    ZeroInterval,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
