//! reportsync core library: domain types, configuration, collaborator
//! traits, content hashing and shared errors.
//!
//! - [`types`]: newtypes and the record / remote object model
//! - [`hasher`]: SHA-256 content digests for change detection
//! - [`traits`]: seams for the remote store, generator, uploader and manifest
//! - [`config`]: YAML configuration load / save / init
//! - [`error`]: [`ConfigError`], [`RemoteError`]

pub mod config;
pub mod error;
pub mod hasher;
pub mod traits;
pub mod types;

pub use config::Config;
pub use error::{BoxError, ConfigError, RemoteError};
pub use hasher::{hash_bytes, hash_file};
pub use traits::{ArtifactGenerator, ManifestSink, RemoteStore, Uploader};
pub use types::{
    FileDigest, FolderId, LoadError, LocalRecord, ObjectId, RecordName, RemoteObject, SyncDecision,
    UploadReceipt,
};
