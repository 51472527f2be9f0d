//! [`Uploader`] that publishes into a named folder of a [`RemoteStore`].

use std::path::Path;
use std::sync::{Arc, OnceLock};

use reportsync_core::{BoxError, FolderId, RemoteStore, UploadReceipt, Uploader};

/// Uploads into `<parent>/<folder>`, resolving the folder on first use.
///
/// A failed resolution is not cached; the next upload tries again.
pub struct RemoteUploader {
    store: Arc<dyn RemoteStore>,
    parent: FolderId,
    folder: String,
    resolved: OnceLock<FolderId>,
}

impl RemoteUploader {
    pub fn new(store: Arc<dyn RemoteStore>, parent: FolderId, folder: impl Into<String>) -> Self {
        RemoteUploader {
            store,
            parent,
            folder: folder.into(),
            resolved: OnceLock::new(),
        }
    }

    fn folder(&self) -> Result<FolderId, BoxError> {
        if let Some(id) = self.resolved.get() {
            return Ok(id.clone());
        }
        let id = self.store.get_folder(&self.parent, &self.folder)?;
        tracing::debug!(folder = %self.folder, id = %id, "resolved output folder");
        Ok(self.resolved.get_or_init(|| id).clone())
    }
}

impl Uploader for RemoteUploader {
    fn upload(&self, path: &Path, mime_type: &str) -> Result<UploadReceipt, BoxError> {
        let folder = self.folder()?;
        let receipt = self.store.upload(path, &folder, mime_type)?;
        tracing::info!(file = %path.display(), link = %receipt.link, "uploaded");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportsync_remote::MemoryRemoteStore;
    use tempfile::TempDir;

    #[test]
    fn uploads_into_named_folder() {
        let store = Arc::new(MemoryRemoteStore::new());
        let out = store.add_folder(&store.root(), "generated");
        let uploader = RemoteUploader::new(store.clone(), store.root(), "generated");

        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.html");
        std::fs::write(&file, "<p>").unwrap();
        uploader.upload(&file, "text/html").unwrap();
        uploader.upload(&file, "text/html").unwrap();

        let uploads = store.uploads();
        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().all(|u| u.folder == out && u.name == "a.html"));
    }

    #[test]
    fn missing_folder_fails_then_recovers() {
        let store = Arc::new(MemoryRemoteStore::new());
        let uploader = RemoteUploader::new(store.clone(), store.root(), "generated");
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.json");
        std::fs::write(&file, "{}").unwrap();

        assert!(uploader.upload(&file, "application/json").is_err());
        store.add_folder(&store.root(), "generated");
        assert!(uploader.upload(&file, "application/json").is_ok());
    }
}
