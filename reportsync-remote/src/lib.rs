//! # reportsync-remote
//!
//! Everything that touches the remote document store:
//!
//! - [`directory`]: data-folder resolution, listing and duplicate tombstoning
//! - [`downloader`]: stream → stabilize → parse state machine with retries
//! - [`fs_store`]: a directory tree acting as the remote store
//! - [`memory`]: an in-process store with scriptable downloads

pub mod directory;
pub mod downloader;
pub mod error;
pub mod fs_store;
pub mod memory;

pub use directory::{dedupe, DedupOutcome, DirectoryListing, RemoteDirectory};
pub use downloader::{
    AttemptFailure, AttemptState, Clock, DownloadOutcome, DownloadPolicy, FsSizeProbe,
    SizeProbe, StableDownloader, SystemClock,
};
pub use error::DownloadError;
pub use fs_store::FsRemoteStore;
pub use memory::{MemoryRemoteStore, Payload};
