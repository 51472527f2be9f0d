//! `reportsync status`: per-record decisions for the next pass.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use reportsync_core::SyncDecision;
use reportsync_sync::{pipeline, Plan, PlannedItem};

use super::{home_dir, load_config};

/// Arguments for `reportsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show decisions as `sync --force` would take them.
    #[arg(long)]
    pub force: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Configuration file to use instead of ~/.reportsync/config.yaml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl StatusArgs {
    pub fn run(self) -> Result<ExitCode> {
        let home = home_dir()?;
        let config = load_config(&home, self.config.as_deref())?;
        let plan = pipeline::plan(&config, self.force).context("failed to compute sync plan")?;

        if self.json {
            print_json(&plan)?;
        } else {
            print_table(&plan);
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Serialize)]
struct StatusReportJson<'a> {
    summary: StatusSummaryJson,
    records: &'a [PlannedItem],
}

#[derive(Serialize)]
struct StatusSummaryJson {
    records: usize,
    download: usize,
    unchanged: usize,
    local_only: usize,
    error: usize,
    duplicates: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "record")]
    record: String,
    #[tabled(rename = "decision")]
    decision: String,
    #[tabled(rename = "remote modified")]
    remote_modified: String,
    #[tabled(rename = "local copy")]
    local: String,
}

fn summarize(plan: &Plan) -> StatusSummaryJson {
    StatusSummaryJson {
        records: plan.items.len(),
        download: plan.count(|d| matches!(d, SyncDecision::Download)),
        unchanged: plan.count(|d| matches!(d, SyncDecision::SkipUnchanged)),
        local_only: plan.count(|d| matches!(d, SyncDecision::LocalOnly)),
        error: plan.count(|d| matches!(d, SyncDecision::Error(_))),
        duplicates: plan.listing.tombstoned.len(),
    }
}

fn print_json(plan: &Plan) -> Result<()> {
    let report = StatusReportJson {
        summary: summarize(plan),
        records: &plan.items,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_table(plan: &Plan) {
    if plan.items.is_empty() {
        println!("{} no records found locally or remotely", "·".dimmed());
        return;
    }

    let rows: Vec<StatusTableRow> = plan
        .items
        .iter()
        .map(|item| StatusTableRow {
            record: item.name.to_string(),
            decision: color_decision(&item.decision),
            remote_modified: item
                .remote
                .as_ref()
                .map(|r| r.modified.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            local: if item.local_path.is_some() {
                "yes".to_string()
            } else {
                "no".to_string()
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let summary = summarize(plan);
    println!(
        "{} records, {} to download, {} unchanged, {} local-only, {} errors, {} duplicates to remove",
        summary.records,
        summary.download,
        summary.unchanged,
        summary.local_only,
        summary.error,
        summary.duplicates,
    );
}

fn color_decision(decision: &SyncDecision) -> String {
    let label = decision.to_string();
    match decision {
        SyncDecision::Download => label.cyan().to_string(),
        SyncDecision::SkipUnchanged => label.green().to_string(),
        SyncDecision::LocalOnly => label.yellow().to_string(),
        SyncDecision::Error(_) => label.red().to_string(),
    }
}
