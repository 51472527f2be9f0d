//! `reportsync validate <FILE>...`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use reportsync_core::LocalRecord;
use reportsync_schema::{Schema, ValidationReport};

use super::{exit_code, home_dir, load_config};

/// Validate local record files against the configured schema.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Record files to check.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Configuration file to use instead of ~/.reportsync/config.yaml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Outcome for one file: a report, or the reason it could not be read.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum FileOutcome {
    Checked { report: ValidationReport },
    Unreadable { path: PathBuf, error: String },
}

impl FileOutcome {
    fn passed(&self) -> bool {
        matches!(self, FileOutcome::Checked { report } if report.passed)
    }
}

impl ValidateArgs {
    pub fn run(self) -> Result<ExitCode> {
        let home = home_dir()?;
        let config = load_config(&home, self.config.as_deref())?;
        let schema = Schema::from_config(&config.schema).context("invalid schema configuration")?;

        let outcomes: Vec<FileOutcome> = self
            .files
            .iter()
            .map(|path| match LocalRecord::load(path) {
                Ok(record) => FileOutcome::Checked {
                    report: schema.validate(record.name().as_str(), &record.data),
                },
                Err(err) => FileOutcome::Unreadable {
                    path: path.clone(),
                    error: err.to_string(),
                },
            })
            .collect();
        let clean = outcomes.iter().all(FileOutcome::passed);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        } else {
            for outcome in &outcomes {
                print_outcome(outcome);
            }
        }
        Ok(exit_code(clean))
    }
}

fn print_outcome(outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Unreadable { path, error } => {
            println!("{} {}: {error}", "✗".red(), path.display());
        }
        FileOutcome::Checked { report } => {
            let marker = if report.passed {
                "✓".green()
            } else {
                "✗".red()
            };
            println!("{marker} {}", report.record.bold());
            for finding in &report.findings {
                let tier = if finding.tier.is_blocking() {
                    finding.tier.to_string().red()
                } else {
                    finding.tier.to_string().yellow()
                };
                println!("  [{tier}] {}: {}", finding.path, finding.message);
            }
        }
    }
}
