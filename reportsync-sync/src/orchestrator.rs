//! Sync orchestration.
//!
//! ## Pass
//!
//! 1. Resolve the data folder (missing folder aborts the pass).
//! 2. Scan it; same-named duplicates are tombstoned before we see the list.
//! 3. Scan the local working set (`*.json` directly under the work dir).
//! 4. Decide per name: remote objects get `Download` / `SkipUnchanged` /
//!    `Error`, local-only files get `LocalOnly` / `SkipUnchanged` / `Error`.
//! 5. Execute decisions one record at a time; a failing record is recorded
//!    in the summary and the pass moves on.
//!
//! Cancellation is honored between records, never mid-download.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::IgnoredAny;
use serde::Serialize;

use reportsync_core::hasher::hash_file;
use reportsync_core::types::{has_json_extension, mime_for_path, modified_at, JSON_MIME};
use reportsync_core::{
    ArtifactGenerator, FileDigest, FolderId, LocalRecord, ManifestSink, RecordName, RemoteObject,
    RemoteStore, SyncDecision, Uploader,
};
use reportsync_remote::{AttemptFailure, DirectoryListing, RemoteDirectory, StableDownloader};
use reportsync_schema::Schema;

use crate::error::{io_err, SyncError};
use crate::summary::{FailureKind, PassSummary};

// ---------------------------------------------------------------------------
// Options & local snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Download every remote object regardless of local state.
    pub force: bool,
    /// Compute decisions only; touch nothing.
    pub dry_run: bool,
}

/// A structured-data file found in the working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: RecordName,
    pub path: PathBuf,
    pub modified: chrono::DateTime<chrono::Utc>,
    pub digest: FileDigest,
    /// Why the file does not parse, if it does not.
    pub parse_error: Option<String>,
}

impl LocalEntry {
    /// Stat, hash and trial-parse one file.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let name = RecordName::from(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        let parse_error = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice::<IgnoredAny>(&bytes)
                .err()
                .map(|e| e.to_string()),
            Err(e) => Some(format!("unreadable: {e}")),
        };
        Ok(LocalEntry {
            name,
            path: path.to_path_buf(),
            modified: modified_at(path).map_err(|e| io_err(path, e))?,
            digest: hash_file(path),
            parse_error,
        })
    }
}

/// Snapshot every `*.json` file directly under `work_dir`, keyed by name.
///
/// Dot-files and directories are ignored. A missing directory is an empty
/// working set.
pub fn scan_local(work_dir: &Path) -> Result<BTreeMap<RecordName, LocalEntry>, SyncError> {
    let mut entries = BTreeMap::new();
    if !work_dir.exists() {
        return Ok(entries);
    }
    for entry in std::fs::read_dir(work_dir).map_err(|e| io_err(work_dir, e))? {
        let entry = entry.map_err(|e| io_err(work_dir, e))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !has_json_extension(&path) {
            continue;
        }
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        let local = LocalEntry::load(&path)?;
        entries.insert(local.name.clone(), local);
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Decide what to do with a remote object given its local copy, if any.
///
/// Priority: unusable name → `Error`; `force` → `Download`; no or
/// unparseable local copy → `Download`; both digests known → equality
/// decides; otherwise local mtime ≥ remote mtime skips.
pub fn decide_remote(
    remote: &RemoteObject,
    local: Option<&LocalEntry>,
    force: bool,
) -> SyncDecision {
    if !remote.name.is_plain_file_name() {
        return SyncDecision::Error(format!(
            "remote name '{}' cannot be used as a local file name",
            remote.name
        ));
    }
    if force {
        return SyncDecision::Download;
    }
    let Some(local) = local else {
        return SyncDecision::Download;
    };
    if local.parse_error.is_some() {
        return SyncDecision::Download;
    }
    if let (Some(remote_digest), Some(local_digest)) =
        (remote.digest.as_deref(), local.digest.as_hex())
    {
        return if remote_digest.eq_ignore_ascii_case(local_digest) {
            SyncDecision::SkipUnchanged
        } else {
            SyncDecision::Download
        };
    }
    if local.modified >= remote.modified {
        SyncDecision::SkipUnchanged
    } else {
        SyncDecision::Download
    }
}

/// Decide what to do with a local file that has no counterpart in the
/// remote enumeration. `remote` is a same-named object seen elsewhere, if any.
pub fn decide_local_only(local: &LocalEntry, remote: Option<&RemoteObject>) -> SyncDecision {
    if let Some(remote) = remote {
        if local.modified <= remote.modified {
            return SyncDecision::SkipUnchanged;
        }
    }
    match &local.parse_error {
        Some(reason) => SyncDecision::Error(format!("local file is not valid JSON: {reason}")),
        None => SyncDecision::LocalOnly,
    }
}

/// One row of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedItem {
    pub name: RecordName,
    pub decision: SyncDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

/// Decisions for a whole pass, sorted by name.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub listing: DirectoryListing,
    pub items: Vec<PlannedItem>,
}

impl Plan {
    pub fn count(&self, pred: impl Fn(&SyncDecision) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.decision)).count()
    }
}

fn plan_items(
    listing: &DirectoryListing,
    local: &BTreeMap<RecordName, LocalEntry>,
    force: bool,
) -> Vec<PlannedItem> {
    let mut items = Vec::with_capacity(listing.objects.len() + local.len());
    for remote in &listing.objects {
        let local_copy = local.get(&remote.name);
        items.push(PlannedItem {
            name: remote.name.clone(),
            decision: decide_remote(remote, local_copy, force),
            remote: Some(remote.clone()),
            local_path: local_copy.map(|l| l.path.clone()),
        });
    }
    let remote_names: std::collections::HashSet<&RecordName> =
        listing.objects.iter().map(|o| &o.name).collect();
    for (name, entry) in local {
        if remote_names.contains(name) {
            continue;
        }
        items.push(PlannedItem {
            name: name.clone(),
            decision: decide_local_only(entry, None),
            remote: None,
            local_path: Some(entry.path.clone()),
        });
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    items
}

// ---------------------------------------------------------------------------
// SyncOrchestrator
// ---------------------------------------------------------------------------

/// Composes remote enumeration, download, validation, generation and upload
/// into one pass.
pub struct SyncOrchestrator {
    store: Arc<dyn RemoteStore>,
    root: FolderId,
    data_folder: String,
    work_dir: PathBuf,
    downloader: StableDownloader,
    schema: Option<Schema>,
    generator: Box<dyn ArtifactGenerator>,
    uploader: Box<dyn Uploader>,
}

impl SyncOrchestrator {
    /// Defaults: the default download policy and no validation rules.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        root: FolderId,
        data_folder: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        generator: Box<dyn ArtifactGenerator>,
        uploader: Box<dyn Uploader>,
    ) -> Self {
        SyncOrchestrator {
            store,
            root,
            data_folder: data_folder.into(),
            work_dir: work_dir.into(),
            downloader: StableDownloader::new(Default::default()),
            schema: None,
            generator,
            uploader,
        }
    }

    pub fn with_downloader(mut self, downloader: StableDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn data_folder(&self) -> Result<FolderId, SyncError> {
        RemoteDirectory::new(self.store.as_ref())
            .resolve_folder(&self.root, &self.data_folder)
            .map_err(|source| {
                if source.is_not_found() {
                    SyncError::DataFolderNotFound {
                        name: self.data_folder.clone(),
                        source,
                    }
                } else {
                    SyncError::Remote(source)
                }
            })
    }

    /// Compute decisions without mutating anything, remote or local.
    pub fn plan(&self, force: bool) -> Result<Plan, SyncError> {
        let folder = self.data_folder()?;
        let listing = RemoteDirectory::new(self.store.as_ref()).scan(&folder, false)?;
        let local = scan_local(&self.work_dir)?;
        let items = plan_items(&listing, &local, force);
        Ok(Plan { listing, items })
    }

    /// Run one pass. Only pass-level failures are returned as `Err`.
    pub fn run(
        &self,
        options: SyncOptions,
        manifest: &mut dyn ManifestSink,
        cancel: &AtomicBool,
    ) -> Result<PassSummary, SyncError> {
        let mut summary = PassSummary::start(options.dry_run);
        tracing::info!(
            folder = %self.data_folder,
            work_dir = %self.work_dir.display(),
            force = options.force,
            dry_run = options.dry_run,
            "sync pass started"
        );

        if options.dry_run {
            let plan = self.plan(options.force)?;
            return Ok(summarize_plan(summary, &plan));
        }

        let folder = self.data_folder()?;
        let listing = RemoteDirectory::new(self.store.as_ref()).scan(&folder, true)?;
        summary.tombstoned = listing.tombstoned.len();
        for (object, reason) in &listing.tombstone_failures {
            summary.warn(format!(
                "could not tombstone duplicate {} ({}): {reason}",
                object.name, object.id
            ));
        }

        std::fs::create_dir_all(&self.work_dir).map_err(|e| io_err(&self.work_dir, e))?;
        let local = scan_local(&self.work_dir)?;
        let items = plan_items(&listing, &local, options.force);

        if items.is_empty() {
            tracing::info!("nothing to do");
            return Ok(summary.finish());
        }

        for item in items {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!(remaining_from = %item.name, "pass cancelled");
                summary.cancelled = true;
                break;
            }
            summary.considered += 1;
            self.execute(&folder, item, manifest, &mut summary);
        }

        let summary = summary.finish();
        tracing::info!(
            considered = summary.considered,
            downloaded = summary.downloaded,
            generated = summary.generated,
            skipped = summary.skipped,
            local_only = summary.local_only,
            tombstoned = summary.tombstoned,
            errored = summary.errored,
            cancelled = summary.cancelled,
            "sync pass finished"
        );
        Ok(summary)
    }

    fn execute(
        &self,
        folder: &FolderId,
        item: PlannedItem,
        manifest: &mut dyn ManifestSink,
        summary: &mut PassSummary,
    ) {
        let name = item.name;
        tracing::debug!(name = %name, decision = %item.decision, "executing");
        match item.decision {
            SyncDecision::SkipUnchanged => summary.skipped += 1,
            SyncDecision::Error(reason) => summary.fail(&name, FailureKind::Local, reason),
            SyncDecision::Download => {
                let Some(remote) = item.remote else {
                    summary.fail(&name, FailureKind::Local, "no remote object to download");
                    return;
                };
                let dest = self.work_dir.join(name.as_str());
                match self.downloader.download(self.store.as_ref(), &remote.id, &dest) {
                    Ok(outcome) => {
                        summary.downloaded += 1;
                        tracing::info!(
                            name = %name,
                            bytes = outcome.bytes,
                            attempts = outcome.attempts,
                            "downloaded"
                        );
                        self.process(&name, &dest, Some(&remote), manifest, summary);
                    }
                    Err(err) => {
                        let kind = match err.last_failure() {
                            AttemptFailure::Corrupt(_) => FailureKind::Corrupt,
                            AttemptFailure::Transient(_) => FailureKind::Transient,
                        };
                        summary.fail(&name, kind, err.to_string());
                    }
                }
            }
            SyncDecision::LocalOnly => {
                let path = item
                    .local_path
                    .unwrap_or_else(|| self.work_dir.join(name.as_str()));
                if self.superseded_remotely(folder, &name, &path) {
                    tracing::info!(name = %name, "newer remote copy appeared; skipping local file");
                    summary.skipped += 1;
                    return;
                }
                summary.local_only += 1;
                self.process(&name, &path, None, manifest, summary);
            }
        }
    }

    /// True when a same-named remote object showed up after the scan and is
    /// at least as new as the local file.
    fn superseded_remotely(&self, folder: &FolderId, name: &RecordName, path: &Path) -> bool {
        let objects = match self.store.list_folder(folder, Some(name.as_str())) {
            Ok(objects) => objects,
            Err(err) => {
                tracing::warn!(
                    name = %name,
                    error = %err,
                    "remote re-check failed; treating file as local-only"
                );
                return false;
            }
        };
        let Some(newest) = objects
            .into_iter()
            .filter(|o| o.is_structured())
            .max_by_key(|o| o.modified)
        else {
            return false;
        };
        match LocalEntry::load(path) {
            Ok(local) => decide_local_only(&local, Some(&newest)) == SyncDecision::SkipUnchanged,
            Err(err) => {
                tracing::warn!(name = %name, error = %err, "cannot re-read local file");
                false
            }
        }
    }

    /// Validate → generate → record in manifest → upload artifact → upload data.
    fn process(
        &self,
        name: &RecordName,
        path: &Path,
        remote: Option<&RemoteObject>,
        manifest: &mut dyn ManifestSink,
        summary: &mut PassSummary,
    ) {
        let record = match LocalRecord::load(path) {
            Ok(record) => record,
            Err(err) => return summary.fail(name, FailureKind::Local, err.to_string()),
        };

        if let Some(schema) = &self.schema {
            let report = schema.validate(name.as_str(), &record.data);
            for advisory in report.advisories() {
                tracing::info!(name = %name, path = %advisory.path, "{}", advisory.message);
            }
            if !report.passed {
                return summary.fail(name, FailureKind::Validation, report.failure_summary());
            }
        }

        let artifact = match self.generator.generate(&record) {
            Ok(artifact) => artifact,
            Err(err) => return summary.fail(name, FailureKind::Generation, err.to_string()),
        };
        manifest.record(name, remote.map_or(record.modified, |r| r.modified));

        let uploads = [
            (artifact.as_path(), mime_for_path(&artifact)),
            (path, JSON_MIME),
        ];
        for (file, mime) in uploads {
            if let Err(err) = self.uploader.upload(file, mime) {
                return summary.fail(
                    name,
                    FailureKind::Upload,
                    format!("{}: {err}", file.display()),
                );
            }
        }
        summary.generated += 1;
    }
}

fn summarize_plan(mut summary: PassSummary, plan: &Plan) -> PassSummary {
    summary.tombstoned = plan.listing.tombstoned.len();
    for item in &plan.items {
        summary.considered += 1;
        match &item.decision {
            SyncDecision::Download => summary.downloaded += 1,
            SyncDecision::SkipUnchanged => summary.skipped += 1,
            SyncDecision::LocalOnly => summary.local_only += 1,
            SyncDecision::Error(reason) => {
                summary.errored += 1;
                summary.errors.push(crate::summary::ObjectFailure {
                    name: item.name.clone(),
                    kind: FailureKind::Local,
                    message: reason.clone(),
                });
            }
        }
    }
    if plan.items.is_empty() {
        tracing::info!("nothing to do");
    }
    summary.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
