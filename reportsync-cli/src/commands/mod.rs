pub mod init;
pub mod status;
pub mod sync;
pub mod validate;
pub mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};

use reportsync_core::{config, Config};

/// Exit status for a command that ran but found per-record failures.
pub const EXIT_RECORD_ERRORS: u8 = 2;

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Load `--config PATH` when given, else `<home>/.reportsync/config.yaml`.
pub fn load_config(home: &Path, explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => config::load_at(home).context("failed to load config; run `reportsync init` first"),
    }
}

pub fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_RECORD_ERRORS)
    }
}
