//! reportsync: keep a local record working set in step with a remote store.
//!
//! # Usage
//!
//! ```text
//! reportsync init [--force]
//! reportsync sync [--force] [--dry-run] [--json] [--config PATH]
//! reportsync status [--force] [--json] [--config PATH]
//! reportsync validate <FILE>... [--json] [--config PATH]
//! reportsync watch [--interval SECS] [--config PATH]
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    init::InitArgs, status::StatusArgs, sync::SyncArgs, validate::ValidateArgs, watch::WatchArgs,
};
use reportsync_daemon::{init_tracing, LogFormat};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "reportsync",
    version,
    about = "Sync structured records from a remote store, validate them and publish reports",
    long_about = None,
)]
struct Cli {
    /// Emit log lines as JSON on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file.
    Init(InitArgs),

    /// Run one synchronization pass.
    Sync(SyncArgs),

    /// Show what the next pass would do for each record.
    Status(StatusArgs),

    /// Validate local record files against the configured schema.
    Validate(ValidateArgs),

    /// Run passes on an interval until interrupted.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Validate(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}
