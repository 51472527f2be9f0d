//! `reportsync watch [--interval SECS]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use super::{home_dir, load_config};

/// Run a pass every `--interval` seconds until ctrl-c.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between the start of consecutive passes.
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Configuration file to use instead of ~/.reportsync/config.yaml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl WatchArgs {
    pub fn run(self) -> Result<ExitCode> {
        let home = home_dir()?;
        let config = load_config(&home, self.config.as_deref())?;

        println!(
            "✓ Watching {} every {}s (ctrl-c to stop)",
            config.remote.root.join(&config.remote.data_folder).display(),
            self.interval
        );
        let stats =
            reportsync_daemon::start_blocking(&home, config, Duration::from_secs(self.interval))
                .context("watch loop failed")?;
        println!(
            "· Stopped after {} passes ({} aborted, {} record errors)",
            stats.passes, stats.failed_passes, stats.errored_records
        );
        Ok(ExitCode::SUCCESS)
    }
}
