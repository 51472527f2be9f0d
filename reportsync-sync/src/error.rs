//! Error types for reportsync-sync.
//!
//! Only pass-level problems live here. Anything that goes wrong with a single
//! record is recorded in the pass summary instead.

use std::path::PathBuf;

use thiserror::Error;

use reportsync_core::{ConfigError, RemoteError};
use reportsync_renderer::RenderError;
use reportsync_schema::SchemaError;

/// All errors that abort a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The data folder does not exist under the remote root; nothing to sync.
    #[error("data folder '{name}' not found in remote store: {source}")]
    DataFolderNotFound {
        name: String,
        #[source]
        source: RemoteError,
    },

    /// Listing or resolving the data folder failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest JSON error.
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A schema path in the config does not parse.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The artifact generator could not be built.
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
