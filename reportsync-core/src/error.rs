//! Error types for reportsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by external collaborators (generator, uploader).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors that can arise from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.reportsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `reportsync init` first")]
    NotFound { path: PathBuf },

    /// `init` refused to replace an existing config.
    #[error("config already exists at {path}; pass --force to overwrite")]
    AlreadyExists { path: PathBuf },

    /// Semantically invalid configuration value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub(crate) fn config_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

/// Errors reported by a [`crate::RemoteStore`] implementation.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The requested folder or object does not exist.
    #[error("remote {kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Network, stream or backing-storage failure.
    #[error("remote I/O error at {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other backend-specific failure.
    #[error("remote store error: {0}")]
    Backend(String),
}

impl RemoteError {
    /// Convenience constructor for [`RemoteError::Io`].
    pub fn io(location: impl Into<String>, source: std::io::Error) -> Self {
        RemoteError::Io {
            location: location.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}
