//! In-process remote store.
//!
//! Unlike a filesystem, it allows several objects to share a display name,
//! and downloads can be scripted per object to simulate corrupt or failing
//! transfers. Tombstoned objects drop out of listings.

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use reportsync_core::hasher::hash_bytes;
use reportsync_core::types::mime_for_path;
use reportsync_core::{
    FolderId, ObjectId, RecordName, RemoteError, RemoteObject, RemoteStore, UploadReceipt,
};

/// One scripted download response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Fail(String),
}

/// An upload seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub folder: FolderId,
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct StoredObject {
    meta: RemoteObject,
    content: Vec<u8>,
    scripted: VecDeque<Payload>,
    downloads: u32,
    tombstoned: bool,
}

#[derive(Debug, Default)]
struct Inner {
    folders: Vec<(FolderId, String, FolderId)>,
    objects: Vec<StoredObject>,
    uploads: Vec<UploadRecord>,
    next_id: u64,
}

impl Inner {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:04}", self.next_id)
    }

    fn object_mut(&mut self, id: &ObjectId) -> Option<&mut StoredObject> {
        self.objects.iter_mut().find(|o| &o.meta.id == id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    inner: Mutex<Inner>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn root(&self) -> FolderId {
        FolderId::from("root")
    }

    pub fn add_folder(&self, parent: &FolderId, name: &str) -> FolderId {
        let mut inner = self.lock();
        let id = FolderId::from(inner.allocate("folder"));
        inner
            .folders
            .push((parent.clone(), name.to_string(), id.clone()));
        id
    }

    /// Store an object with a SHA-256 digest of `content`.
    pub fn put(
        &self,
        folder: &FolderId,
        name: &str,
        content: &[u8],
        modified: DateTime<Utc>,
    ) -> ObjectId {
        let mut inner = self.lock();
        let id = ObjectId::from(inner.allocate("obj"));
        inner.objects.push(StoredObject {
            meta: RemoteObject {
                id: id.clone(),
                name: RecordName::from(name),
                mime_type: mime_for_path(Path::new(name)).to_string(),
                modified,
                digest: Some(hash_bytes(content)),
                parent: Some(folder.clone()),
            },
            content: content.to_vec(),
            scripted: VecDeque::new(),
            downloads: 0,
            tombstoned: false,
        });
        id
    }

    /// Replace an object's content in place, as a remote edit would.
    pub fn update(&self, id: &ObjectId, content: &[u8], modified: DateTime<Utc>) {
        if let Some(object) = self.lock().object_mut(id) {
            object.content = content.to_vec();
            object.meta.modified = modified;
            if object.meta.digest.is_some() {
                object.meta.digest = Some(hash_bytes(content));
            }
        }
    }

    /// Override the digest the store reports (`None` = store has no digest).
    pub fn set_digest(&self, id: &ObjectId, digest: Option<String>) {
        if let Some(object) = self.lock().object_mut(id) {
            object.meta.digest = digest;
        }
    }

    /// Queue responses for the next downloads of `id`; once drained, the
    /// stored content is served.
    pub fn script_downloads(&self, id: &ObjectId, payloads: Vec<Payload>) {
        if let Some(object) = self.lock().object_mut(id) {
            object.scripted.extend(payloads);
        }
    }

    pub fn download_count(&self, id: &ObjectId) -> u32 {
        self.lock()
            .objects
            .iter()
            .find(|o| &o.meta.id == id)
            .map(|o| o.downloads)
            .unwrap_or(0)
    }

    pub fn total_downloads(&self) -> u32 {
        self.lock().objects.iter().map(|o| o.downloads).sum()
    }

    pub fn tombstoned(&self) -> Vec<ObjectId> {
        self.lock()
            .objects
            .iter()
            .filter(|o| o.tombstoned)
            .map(|o| o.meta.id.clone())
            .collect()
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.lock().uploads.clone()
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn list_folder(
        &self,
        parent: &FolderId,
        name_filter: Option<&str>,
    ) -> Result<Vec<RemoteObject>, RemoteError> {
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|o| !o.tombstoned && o.meta.parent.as_ref() == Some(parent))
            .filter(|o| name_filter.map_or(true, |n| o.meta.name.as_str() == n))
            .map(|o| o.meta.clone())
            .collect())
    }

    fn get_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, RemoteError> {
        self.lock()
            .folders
            .iter()
            .find(|(p, n, _)| p == parent && n == name)
            .map(|(_, _, id)| id.clone())
            .ok_or_else(|| RemoteError::NotFound {
                kind: "folder",
                name: name.to_string(),
            })
    }

    fn download_stream(&self, id: &ObjectId) -> Result<Box<dyn Read + Send>, RemoteError> {
        let mut inner = self.lock();
        let object = inner
            .object_mut(id)
            .filter(|o| !o.tombstoned)
            .ok_or_else(|| RemoteError::NotFound {
                kind: "object",
                name: id.to_string(),
            })?;
        object.downloads += 1;
        match object.scripted.pop_front() {
            Some(Payload::Bytes(bytes)) => Ok(Box::new(Cursor::new(bytes))),
            Some(Payload::Fail(reason)) => Err(RemoteError::Backend(reason)),
            None => Ok(Box::new(Cursor::new(object.content.clone()))),
        }
    }

    fn tombstone(&self, id: &ObjectId) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        let object = inner.object_mut(id).ok_or_else(|| RemoteError::NotFound {
            kind: "object",
            name: id.to_string(),
        })?;
        object.tombstoned = true;
        Ok(())
    }

    fn upload(
        &self,
        local_path: &Path,
        dest_folder: &FolderId,
        mime_type: &str,
    ) -> Result<UploadReceipt, RemoteError> {
        let bytes = std::fs::read(local_path)
            .map_err(|e| RemoteError::io(local_path.display().to_string(), e))?;
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut inner = self.lock();
        let known = inner.folders.iter().any(|(_, _, id)| id == dest_folder);
        if !known && dest_folder.as_str() != "root" {
            return Err(RemoteError::NotFound {
                kind: "folder",
                name: dest_folder.to_string(),
            });
        }
        let id = ObjectId::from(inner.allocate("upload"));
        inner.uploads.push(UploadRecord {
            folder: dest_folder.clone(),
            name,
            mime_type: mime_type.to_string(),
            bytes,
        });
        Ok(UploadReceipt {
            link: format!("memory://{id}"),
            id,
        })
    }
}

/// Names currently visible in `folder`, with multiplicity.
pub fn name_counts(store: &MemoryRemoteStore, folder: &FolderId) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    if let Ok(objects) = store.list_folder(folder, None) {
        for object in objects {
            *counts.entry(object.name.0).or_insert(0) += 1;
        }
    }
    counts
}
