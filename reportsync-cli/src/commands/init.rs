//! `reportsync init [--force]`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use reportsync_core::config;

use super::home_dir;

/// Write a default configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Replace an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<ExitCode> {
        let home = home_dir()?;
        let path = config::init_at(&home, self.force)
            .context("failed to write config (use --force to replace an existing one)")?;
        println!("✓ Wrote default config");
        println!("  Saved to: {}", path.display());
        println!("  Edit remote.root and local.work_dir, then run `reportsync sync`.");
        Ok(ExitCode::SUCCESS)
    }
}
