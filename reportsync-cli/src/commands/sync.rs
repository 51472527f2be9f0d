//! `reportsync sync [--force] [--dry-run] [--json] [--config PATH]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use reportsync_sync::{pipeline, PassSummary, SyncOptions};

use super::{exit_code, home_dir, load_config};

/// Run one synchronization pass.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Download and process every remote record regardless of local state.
    #[arg(long)]
    pub force: bool,

    /// Compute decisions without downloading, generating or uploading.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the pass summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Configuration file to use instead of ~/.reportsync/config.yaml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl SyncArgs {
    pub fn run(self) -> Result<ExitCode> {
        let home = home_dir()?;
        let config = load_config(&home, self.config.as_deref())?;
        let options = SyncOptions {
            force: self.force,
            dry_run: self.dry_run,
        };

        let summary = pipeline::run_pass(&home, &config, options, &AtomicBool::new(false))
            .context("sync pass aborted")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
        Ok(exit_code(summary.is_clean()))
    }
}

fn print_summary(summary: &PassSummary) {
    let prefix = if summary.dry_run { "[dry-run] " } else { "" };

    for failure in &summary.errors {
        println!(
            "{prefix}{} {} [{}] {}",
            "✗".red(),
            failure.name.as_str().bold(),
            failure.kind,
            failure.message
        );
    }
    for warning in &summary.warnings {
        println!("{prefix}{} {}", "!".yellow(), warning);
    }

    if summary.is_empty() {
        println!("{prefix}{} nothing to do", "·".dimmed());
        return;
    }

    let verb = if summary.dry_run { "would download" } else { "downloaded" };
    println!(
        "{prefix}{} {} {verb}, {} generated, {} unchanged, {} local-only, {} duplicates removed",
        "✓".green(),
        summary.downloaded,
        summary.generated,
        summary.skipped,
        summary.local_only,
        summary.tombstoned,
    );
    if summary.errored > 0 {
        println!(
            "{prefix}{} {} of {} records failed",
            "✗".red(),
            summary.errored,
            summary.considered
        );
    }
    if summary.cancelled {
        println!("{prefix}{} pass cancelled before all records were processed", "~".yellow());
    }
}
