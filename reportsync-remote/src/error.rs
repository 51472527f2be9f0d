//! Error types for reportsync-remote.

use std::path::PathBuf;

use thiserror::Error;

use crate::downloader::AttemptFailure;

/// Terminal download failure, surfaced after the retry budget is spent.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download to {path} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        path: PathBuf,
        attempts: u32,
        last: AttemptFailure,
    },
}

impl DownloadError {
    pub fn last_failure(&self) -> &AttemptFailure {
        match self {
            DownloadError::Exhausted { last, .. } => last,
        }
    }
}
