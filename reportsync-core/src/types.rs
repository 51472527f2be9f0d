//! Domain types for reportsync.
//!
//! All path fields use `PathBuf`; timestamps are `DateTime<Utc>`.
//! Remote snapshots are immutable once listed; local records are reloaded
//! from disk whenever they change.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hasher::hash_file;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Identifier of an object in the remote store.
    ObjectId
);

string_newtype!(
    /// Identifier of a folder in the remote store.
    FolderId
);

string_newtype!(
    /// Display name of a record; doubles as its local file name.
    RecordName
);

impl RecordName {
    /// True when the name can be used verbatim as a file name inside the
    /// working directory (no separators, no parent references).
    pub fn is_plain_file_name(&self) -> bool {
        let name = self.0.as_str();
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\')
            && !name.contains('\0')
    }
}

// ---------------------------------------------------------------------------
// Remote snapshot
// ---------------------------------------------------------------------------

pub const JSON_MIME: &str = "application/json";

/// Snapshot of one remote object at listing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: ObjectId,
    pub name: RecordName,
    pub mime_type: String,
    pub modified: DateTime<Utc>,
    /// SHA-256 hex digest of the object bytes, when the store provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<FolderId>,
}

impl RemoteObject {
    /// Structured-data objects are the only ones the pipeline consumes.
    pub fn is_structured(&self) -> bool {
        self.mime_type == JSON_MIME || has_json_extension(Path::new(self.name.as_str()))
    }
}

/// MIME type guessed from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("json") => JSON_MIME,
        Some("html") | Some("htm") => "text/html",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

pub fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Local records
// ---------------------------------------------------------------------------

/// Result of hashing a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "hex", rename_all = "lowercase")]
pub enum FileDigest {
    Available(String),
    /// The file could not be read; callers fall back to timestamps.
    Unavailable,
}

impl FileDigest {
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            FileDigest::Available(hex) => Some(hex),
            FileDigest::Unavailable => None,
        }
    }
}

/// A structured-data file in the local working set.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    pub path: PathBuf,
    pub data: serde_json::Value,
    pub modified: DateTime<Utc>,
    pub digest: FileDigest,
}

impl LocalRecord {
    /// Read, parse, stat and hash the file at `path`.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = serde_json::from_slice(&bytes).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let modified = modified_at(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(LocalRecord {
            path: path.to_path_buf(),
            data,
            modified,
            digest: hash_file(path),
        })
    }

    /// Record name derived from the file name.
    pub fn name(&self) -> RecordName {
        RecordName::from(
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    }
}

/// Failure to materialize a [`LocalRecord`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Filesystem mtime as a UTC timestamp.
pub fn modified_at(path: &Path) -> std::io::Result<DateTime<Utc>> {
    let mtime = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(mtime))
}

// ---------------------------------------------------------------------------
// Decisions & receipts
// ---------------------------------------------------------------------------

/// Per-candidate outcome of change detection, computed once per pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum SyncDecision {
    Download,
    SkipUnchanged,
    LocalOnly,
    Error(String),
}

impl fmt::Display for SyncDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDecision::Download => write!(f, "download"),
            SyncDecision::SkipUnchanged => write!(f, "unchanged"),
            SyncDecision::LocalOnly => write!(f, "local-only"),
            SyncDecision::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// What the remote store hands back after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: ObjectId,
    pub link: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
