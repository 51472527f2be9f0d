//! Filesystem-backed remote store.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   data/                 folder id "data"
//!     alice.json          object id "data/alice.json"
//!   generated/            folder id "generated"
//!   .tombstones/          removed objects, renamed with a timestamp prefix
//! ```
//!
//! Folder and object ids are `/`-separated paths relative to the root; the
//! root itself is the empty id. Dot-files are never listed.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;

use reportsync_core::hasher::hash_file;
use reportsync_core::types::{mime_for_path, modified_at};
use reportsync_core::{
    FolderId, ObjectId, RecordName, RemoteError, RemoteObject, RemoteStore, UploadReceipt,
};

const TOMBSTONE_DIR: &str = ".tombstones";

#[derive(Debug, Clone)]
pub struct FsRemoteStore {
    root: PathBuf,
}

impl FsRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsRemoteStore { root: root.into() }
    }

    pub fn root_folder(&self) -> FolderId {
        FolderId::from("")
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Map an id onto the filesystem, refusing anything that escapes the root.
    fn resolve(&self, id: &str) -> Result<PathBuf, RemoteError> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RemoteError::Backend(format!(
                "id '{id}' is not a path inside the store"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn tombstone_dir(&self) -> PathBuf {
        self.root.join(TOMBSTONE_DIR)
    }
}

fn child_id(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", parent.trim_end_matches('/'))
    }
}

fn io(location: &Path, err: std::io::Error) -> RemoteError {
    RemoteError::io(location.display().to_string(), err)
}

impl RemoteStore for FsRemoteStore {
    fn list_folder(
        &self,
        parent: &FolderId,
        name_filter: Option<&str>,
    ) -> Result<Vec<RemoteObject>, RemoteError> {
        let dir = self.resolve(parent.as_str())?;
        if !dir.is_dir() {
            return Err(RemoteError::NotFound {
                kind: "folder",
                name: parent.to_string(),
            });
        }
        let mut objects = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| io(&dir, e))? {
            let entry = entry.map_err(|e| io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name_filter.is_some_and(|f| f != name) {
                continue;
            }
            let path = entry.path();
            let meta = entry.metadata().map_err(|e| io(&path, e))?;
            if !meta.is_file() {
                continue;
            }
            objects.push(RemoteObject {
                id: ObjectId::from(child_id(parent.as_str(), &name)),
                mime_type: mime_for_path(&path).to_string(),
                modified: modified_at(&path).map_err(|e| io(&path, e))?,
                digest: hash_file(&path).as_hex().map(str::to_string),
                parent: Some(parent.clone()),
                name: RecordName::from(name),
            });
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn get_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, RemoteError> {
        let id = child_id(parent.as_str(), name);
        let path = self.resolve(&id)?;
        if name.starts_with('.') || !path.is_dir() {
            return Err(RemoteError::NotFound {
                kind: "folder",
                name: name.to_string(),
            });
        }
        Ok(FolderId::from(id))
    }

    fn download_stream(&self, id: &ObjectId) -> Result<Box<dyn Read + Send>, RemoteError> {
        let path = self.resolve(id.as_str())?;
        match std::fs::File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(RemoteError::NotFound {
                kind: "object",
                name: id.to_string(),
            }),
            Err(err) => Err(io(&path, err)),
        }
    }

    fn tombstone(&self, id: &ObjectId) -> Result<(), RemoteError> {
        let path = self.resolve(id.as_str())?;
        if !path.is_file() {
            return Err(RemoteError::NotFound {
                kind: "object",
                name: id.to_string(),
            });
        }
        let dir = self.tombstone_dir();
        std::fs::create_dir_all(&dir).map_err(|e| io(&dir, e))?;
        let target = dir.join(format!(
            "{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.f"),
            id.as_str().replace('/', "__")
        ));
        std::fs::rename(&path, &target).map_err(|e| io(&path, e))?;
        Ok(())
    }

    fn upload(
        &self,
        local_path: &Path,
        dest_folder: &FolderId,
        _mime_type: &str,
    ) -> Result<UploadReceipt, RemoteError> {
        let dir = self.resolve(dest_folder.as_str())?;
        if !dir.is_dir() {
            return Err(RemoteError::NotFound {
                kind: "folder",
                name: dest_folder.to_string(),
            });
        }
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RemoteError::Backend(format!("{} has no file name", local_path.display()))
            })?;
        let target = dir.join(&name);
        let tmp = dir.join(format!(".{name}.upload.tmp"));
        std::fs::copy(local_path, &tmp).map_err(|e| io(local_path, e))?;
        if let Err(e) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io(&target, e));
        }
        let link = std::fs::canonicalize(&target)
            .map(|p| format!("file://{}", p.display()))
            .unwrap_or_else(|_| format!("file://{}", target.display()));
        Ok(UploadReceipt {
            id: ObjectId::from(child_id(dest_folder.as_str(), &name)),
            link,
        })
    }
}
