//! Periodic sync runtime: one pass per tick until ctrl-c or an explicit
//! shutdown, with the in-flight pass stopped between records.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_with, start_blocking, DaemonStats, LogFormat};
