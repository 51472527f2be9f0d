//! Remote enumeration and duplicate collapsing.
//!
//! Objects sharing a display name are grouped; the most recently modified
//! one survives and the rest are tombstoned before the listing is handed
//! back, so callers never observe duplicate names.
//!
//! Tie-break: among equal modification times the lexicographically smallest
//! object id wins, independent of listing order.

use std::cmp::Ordering;
use std::collections::HashMap;

use reportsync_core::{FolderId, RecordName, RemoteError, RemoteObject, RemoteStore};

/// Result of splitting a listing into authoritative objects and duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DedupOutcome {
    /// One object per name, sorted by name.
    pub survivors: Vec<RemoteObject>,
    /// Non-authoritative objects, sorted by (name, id).
    pub duplicates: Vec<RemoteObject>,
}

/// Collapse same-named objects. Pure; no store access.
pub fn dedupe(objects: Vec<RemoteObject>) -> DedupOutcome {
    let mut groups: HashMap<RecordName, Vec<RemoteObject>> = HashMap::new();
    for object in objects {
        groups.entry(object.name.clone()).or_default().push(object);
    }

    let mut outcome = DedupOutcome::default();
    for (_, mut group) in groups {
        group.sort_by(authority);
        let mut members = group.into_iter();
        if let Some(survivor) = members.next() {
            outcome.survivors.push(survivor);
        }
        outcome.duplicates.extend(members);
    }
    outcome.survivors.sort_by(|a, b| a.name.cmp(&b.name));
    outcome
        .duplicates
        .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    outcome
}

/// Most authoritative first: newest modification, then smallest id.
fn authority(a: &RemoteObject, b: &RemoteObject) -> Ordering {
    b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id))
}

/// Deduplicated view of the data folder.
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    pub folder: FolderId,
    pub objects: Vec<RemoteObject>,
    /// Duplicates successfully tombstoned (or that would be, in dry-run).
    pub tombstoned: Vec<RemoteObject>,
    /// Duplicates whose tombstone request failed, with the reason.
    pub tombstone_failures: Vec<(RemoteObject, String)>,
}

/// Folder resolution and enumeration over a [`RemoteStore`].
pub struct RemoteDirectory<'a> {
    store: &'a dyn RemoteStore,
}

impl<'a> RemoteDirectory<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        RemoteDirectory { store }
    }

    /// Resolve a folder directly under `parent`.
    pub fn resolve_folder(&self, parent: &FolderId, name: &str) -> Result<FolderId, RemoteError> {
        let folder = self.store.get_folder(parent, name)?;
        tracing::debug!(parent = %parent, name, folder = %folder, "resolved folder");
        Ok(folder)
    }

    /// List structured objects in `folder`, collapsing duplicates.
    ///
    /// With `apply_tombstones == false` nothing is mutated: duplicates are
    /// reported as `tombstoned` without a request being issued.
    pub fn scan(
        &self,
        folder: &FolderId,
        apply_tombstones: bool,
    ) -> Result<DirectoryListing, RemoteError> {
        let listed = self.store.list_folder(folder, None)?;
        let total = listed.len();
        let structured: Vec<_> = listed.into_iter().filter(|o| o.is_structured()).collect();
        tracing::debug!(
            folder = %folder,
            total,
            structured = structured.len(),
            "listed remote folder"
        );

        let DedupOutcome {
            survivors,
            duplicates,
        } = dedupe(structured);

        let mut listing = DirectoryListing {
            folder: folder.clone(),
            objects: survivors,
            ..DirectoryListing::default()
        };

        for duplicate in duplicates {
            if !apply_tombstones {
                listing.tombstoned.push(duplicate);
                continue;
            }
            match self.store.tombstone(&duplicate.id) {
                Ok(()) => {
                    tracing::info!(
                        name = %duplicate.name,
                        id = %duplicate.id,
                        "tombstoned duplicate"
                    );
                    listing.tombstoned.push(duplicate);
                }
                Err(err) => {
                    tracing::warn!(
                        name = %duplicate.name,
                        id = %duplicate.id,
                        error = %err,
                        "failed to tombstone duplicate"
                    );
                    listing.tombstone_failures.push((duplicate, err.to_string()));
                }
            }
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRemoteStore;
    use chrono::{Duration, TimeZone, Utc};
    use reportsync_core::ObjectId;
    use rstest::rstest;

    fn object(id: &str, name: &str, minutes: i64) -> RemoteObject {
        RemoteObject {
            id: ObjectId::from(id),
            name: RecordName::from(name),
            mime_type: "application/json".to_string(),
            modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
            digest: None,
            parent: None,
        }
    }

    #[test]
    fn newest_duplicate_survives() {
        let outcome = dedupe(vec![
            object("a", "alice.json", 1),
            object("b", "alice.json", 5),
            object("c", "alice.json", 3),
            object("d", "bob.json", 0),
        ]);
        let survivors: Vec<_> = outcome.survivors.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(survivors, vec!["b", "d"]);
        let losers: Vec<_> = outcome.duplicates.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(losers, vec!["a", "c"]);
    }

    #[rstest]
    #[case(&[1, 5, 3], "m5")]
    #[case(&[9, 2], "m9")]
    #[case(&[4], "m4")]
    fn survivor_has_latest_modification(#[case] minutes: &[i64], #[case] expected: &str) {
        let objects = minutes
            .iter()
            .map(|m| object(&format!("m{m}"), "r.json", *m))
            .collect();
        let outcome = dedupe(objects);
        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.survivors[0].id.as_str(), expected);
        assert_eq!(outcome.duplicates.len(), minutes.len() - 1);
    }

    #[test]
    fn equal_timestamps_prefer_smallest_id_regardless_of_order() {
        let forward = dedupe(vec![object("x2", "n.json", 0), object("x1", "n.json", 0)]);
        let backward = dedupe(vec![object("x1", "n.json", 0), object("x2", "n.json", 0)]);
        assert_eq!(forward.survivors[0].id.as_str(), "x1");
        assert_eq!(forward, backward);
    }

    #[test]
    fn unique_names_produce_no_duplicates() {
        let outcome = dedupe(vec![object("a", "a.json", 0), object("b", "b.json", 0)]);
        assert_eq!(outcome.survivors.len(), 2);
        assert!(outcome.duplicates.is_empty());
    }

    #[test]
    fn scan_tombstones_before_returning() {
        let store = MemoryRemoteStore::new();
        let data = store.add_folder(&store.root(), "data");
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let old = store.put(&data, "alice.json", br#"{"v":1}"#, base);
        let new = store.put(&data, "alice.json", br#"{"v":2}"#, base + Duration::hours(1));
        store.put(&data, "notes.txt", b"ignored", base);

        let listing = RemoteDirectory::new(&store).scan(&data, true).unwrap();

        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].id, new);
        assert_eq!(store.tombstoned(), vec![old.clone()]);
        assert_eq!(listing.tombstoned[0].id, old);
    }

    #[test]
    fn dry_scan_does_not_mutate() {
        let store = MemoryRemoteStore::new();
        let data = store.add_folder(&store.root(), "data");
        let base = Utc::now();
        store.put(&data, "alice.json", b"{}", base);
        store.put(&data, "alice.json", b"{}", base + Duration::seconds(1));

        let listing = RemoteDirectory::new(&store).scan(&data, false).unwrap();
        assert_eq!(listing.tombstoned.len(), 1);
        assert!(store.tombstoned().is_empty());
    }

    #[test]
    fn missing_folder_is_not_found() {
        let store = MemoryRemoteStore::new();
        let err = RemoteDirectory::new(&store)
            .resolve_folder(&store.root(), "data")
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
