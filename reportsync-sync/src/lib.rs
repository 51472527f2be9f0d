//! # reportsync-sync
//!
//! One synchronization pass: enumerate and deduplicate the remote data
//! folder, decide per record whether to download, skip or process a
//! local-only file, then validate, generate and upload.
//!
//! Call [`pipeline::run_pass`] to run a pass from a loaded [`Config`], or
//! build a [`SyncOrchestrator`] directly to plug in other collaborators.
//!
//! [`Config`]: reportsync_core::Config

pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod pipeline;
pub mod summary;
pub mod uploader;

pub use error::SyncError;
pub use manifest::JsonManifest;
pub use orchestrator::{
    decide_local_only, decide_remote, scan_local, LocalEntry, Plan, PlannedItem, SyncOptions,
    SyncOrchestrator,
};
pub use summary::{FailureKind, ObjectFailure, PassSummary};
pub use uploader::RemoteUploader;
