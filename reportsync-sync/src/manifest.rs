//! Manifest: write-only audit trail of processed records.
//!
//! Persists a [`ManifestFile`] JSON document at
//! `<home>/.reportsync/manifest.json`. Entries are buffered through
//! [`ManifestSink::record`] and written once per pass with the atomic `.tmp`
//! + rename pattern. The pipeline never reads it back for change detection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reportsync_core::config::manifest_path_at;
use reportsync_core::{ManifestSink, RecordName};

use crate::error::{io_err, SyncError};

/// On-disk manifest payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestFile {
    pub updated_at: DateTime<Utc>,
    pub entries: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug)]
pub struct JsonManifest {
    path: PathBuf,
    file: ManifestFile,
    dirty: bool,
}

impl JsonManifest {
    /// Load the manifest at `path`; a missing file loads as empty.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let file = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
            serde_json::from_str(&contents)?
        } else {
            ManifestFile {
                updated_at: Utc::now(),
                entries: BTreeMap::new(),
            }
        };
        Ok(JsonManifest {
            path: path.to_path_buf(),
            file,
            dirty: false,
        })
    }

    /// Load `<home>/.reportsync/manifest.json`.
    pub fn load_at(home: &Path) -> Result<Self, SyncError> {
        Self::load(&manifest_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &BTreeMap<String, DateTime<Utc>> {
        &self.file.entries
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.file.updated_at
    }

    /// Write buffered entries. No-op when nothing was recorded.
    pub fn flush(&mut self) -> Result<(), SyncError> {
        if !self.dirty {
            return Ok(());
        }
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid manifest path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        self.file.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(&self.file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), entries = self.file.entries.len(), "manifest saved");
        Ok(())
    }
}

impl ManifestSink for JsonManifest {
    fn record(&mut self, name: &RecordName, timestamp: DateTime<Utc>) {
        self.file.entries.insert(name.to_string(), timestamp);
        self.dirty = true;
    }
}
