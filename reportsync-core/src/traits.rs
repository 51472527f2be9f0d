//! Collaborator seams.
//!
//! The pipeline only talks to the outside world through these traits: the
//! remote document store, the artifact generator, the uploader and the
//! optional manifest sink. Implementations live in the feature crates (or in
//! the embedding application).

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{BoxError, RemoteError};
use crate::types::{FolderId, LocalRecord, ObjectId, RecordName, RemoteObject, UploadReceipt};

/// Remote document store client.
pub trait RemoteStore: Send + Sync {
    /// Objects directly inside `parent`, optionally restricted to an exact
    /// display name.
    fn list_folder(
        &self,
        parent: &FolderId,
        name_filter: Option<&str>,
    ) -> Result<Vec<RemoteObject>, RemoteError>;

    /// Resolve a child folder by name. Fails with [`RemoteError::NotFound`]
    /// when no folder of that name sits directly under `parent`.
    fn get_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, RemoteError>;

    /// Open a byte stream over the object's content.
    fn download_stream(&self, id: &ObjectId) -> Result<Box<dyn Read + Send>, RemoteError>;

    /// Mark an object for removal.
    fn tombstone(&self, id: &ObjectId) -> Result<(), RemoteError>;

    fn upload(
        &self,
        local_path: &Path,
        dest_folder: &FolderId,
        mime_type: &str,
    ) -> Result<UploadReceipt, RemoteError>;
}

/// Turns a validated record into an artifact on disk.
pub trait ArtifactGenerator: Send + Sync {
    fn generate(&self, record: &LocalRecord) -> Result<PathBuf, BoxError>;
}

/// Pushes a local file to wherever generated output is published.
pub trait Uploader: Send + Sync {
    fn upload(&self, path: &Path, mime_type: &str) -> Result<UploadReceipt, BoxError>;
}

/// Write-only audit sink for processed records.
pub trait ManifestSink: Send {
    fn record(&mut self, name: &RecordName, timestamp: DateTime<Utc>);
}

/// Sink that drops every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullManifest;

impl ManifestSink for NullManifest {
    fn record(&mut self, _name: &RecordName, _timestamp: DateTime<Utc>) {}
}
