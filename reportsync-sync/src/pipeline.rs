//! Shared sync pipeline entrypoint used by CLI and daemon.
//!
//! Wires the configured collaborators together: the filesystem-backed
//! remote store, the HTML report generator, the output-folder uploader and
//! the JSON manifest.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use reportsync_core::{Config, RemoteStore};
use reportsync_remote::{DownloadPolicy, FsRemoteStore, StableDownloader};
use reportsync_renderer::HtmlReportGenerator;
use reportsync_schema::Schema;

use crate::manifest::JsonManifest;
use crate::orchestrator::{Plan, SyncOptions, SyncOrchestrator};
use crate::summary::PassSummary;
use crate::uploader::RemoteUploader;
use crate::SyncError;

/// Build an orchestrator from `config`.
pub fn build(config: &Config) -> Result<SyncOrchestrator, SyncError> {
    let fs_store = FsRemoteStore::new(&config.remote.root);
    let root = fs_store.root_folder();
    let store: Arc<dyn RemoteStore> = Arc::new(fs_store);

    let generator = HtmlReportGenerator::new(
        &config.local.artifact_dir,
        config.local.template_dir.as_deref(),
    )?;
    let uploader = RemoteUploader::new(
        store.clone(),
        root.clone(),
        config.remote.output_folder.clone(),
    );
    let schema = Schema::from_config(&config.schema)?;
    let downloader = StableDownloader::new(DownloadPolicy::from(&config.download));

    Ok(SyncOrchestrator::new(
        store,
        root,
        config.remote.data_folder.clone(),
        &config.local.work_dir,
        Box::new(generator),
        Box::new(uploader),
    )
    .with_downloader(downloader)
    .with_schema(schema))
}

/// Run one pass and persist the manifest under `home`.
///
/// This is the canonical sync entrypoint for both `reportsync sync` and the
/// daemon loop. A manifest that cannot be saved is reported as a warning.
pub fn run_pass(
    home: &Path,
    config: &Config,
    options: SyncOptions,
    cancel: &AtomicBool,
) -> Result<PassSummary, SyncError> {
    let orchestrator = build(config)?;
    let mut manifest = JsonManifest::load_at(home)?;
    let mut summary = orchestrator.run(options, &mut manifest, cancel)?;
    if !options.dry_run {
        if let Err(err) = manifest.flush() {
            tracing::warn!(error = %err, "failed to save manifest");
            summary.warn(format!("manifest not saved: {err}"));
        }
    }
    Ok(summary)
}

/// Decisions a pass would take right now, without side effects.
pub fn plan(config: &Config, force: bool) -> Result<Plan, SyncError> {
    build(config)?.plan(force)
}
