use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use reportsync_core::Config;
use reportsync_sync::{pipeline, PassSummary, SyncError, SyncOptions};

use crate::error::{io_err, DaemonError};

/// Counters accumulated over the daemon's lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DaemonStats {
    pub passes: usize,
    /// Passes that aborted (for example, data folder missing).
    pub failed_passes: usize,
    /// Records that errored, summed over all passes.
    pub errored_records: usize,
    pub last_summary: Option<PassSummary>,
}

impl DaemonStats {
    fn record(&mut self, result: Result<PassSummary, SyncError>, elapsed: Duration) {
        self.passes += 1;
        match result {
            Ok(summary) => {
                tracing::info!(
                    pass = self.passes,
                    duration_ms = elapsed.as_millis() as u64,
                    "{summary}"
                );
                self.errored_records += summary.errored;
                self.last_summary = Some(summary);
            }
            Err(err) => {
                tracing::error!(pass = self.passes, error = %err, "sync pass aborted");
                self.failed_passes += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(
    home: &Path,
    config: Config,
    interval: Duration,
) -> Result<DaemonStats, DaemonError> {
    init_tracing(LogFormat::Text);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    runtime.block_on(run(home.to_path_buf(), config, interval, shutdown_tx))
}

/// Run a full sync pass every `interval` until shutdown.
pub async fn run(
    home: PathBuf,
    config: Config,
    interval: Duration,
    shutdown: broadcast::Sender<()>,
) -> Result<DaemonStats, DaemonError> {
    let config = Arc::new(config);
    tracing::info!(
        home = %home.display(),
        interval_secs = interval.as_secs(),
        "daemon started"
    );
    run_with(interval, shutdown, move |cancel: Arc<AtomicBool>| {
        pipeline::run_pass(&home, &config, SyncOptions::default(), &cancel)
    })
    .await
}

/// Drive `pass` on a fixed interval until ctrl-c or a message on `shutdown`.
///
/// Each pass runs on the blocking pool. Shutdown raises the flag handed to
/// the pass, so an in-flight pass stops at the next record boundary; the
/// loop then exits without starting another.
pub async fn run_with<F>(
    interval: Duration,
    shutdown: broadcast::Sender<()>,
    pass: F,
) -> Result<DaemonStats, DaemonError>
where
    F: Fn(Arc<AtomicBool>) -> Result<PassSummary, SyncError> + Send + Sync + 'static,
{
    if interval.is_zero() {
        return Err(DaemonError::ZeroInterval);
    }
    let cancel = Arc::new(AtomicBool::new(false));
    let pass = Arc::new(pass);

    let signal_handle = {
        let shutdown = shutdown.clone();
        let cancel = cancel.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, shutting down daemon");
                        Ok(())
                    }
                    Err(err) => Err(DaemonError::Signal(err.to_string())),
                },
            };
            cancel.store(true, Ordering::SeqCst);
            let _ = shutdown.send(());
            result
        })
    };

    let loop_handle = {
        let shutdown_rx = shutdown.subscribe();
        let shutdown = shutdown.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = pass_loop(interval, cancel, pass, shutdown_rx).await;
            // Release the signal task however the loop ended.
            let _ = shutdown.send(());
            result
        })
    };

    let (loop_result, signal_result) = tokio::join!(loop_handle, signal_handle);
    let stats = loop_result.map_err(|err| DaemonError::Join {
        task: "pass_loop",
        message: err.to_string(),
    })??;
    signal_result.map_err(|err| DaemonError::Join {
        task: "signal_handler",
        message: err.to_string(),
    })??;
    tracing::info!(passes = stats.passes, "daemon stopped");
    Ok(stats)
}

async fn pass_loop<F>(
    interval: Duration,
    cancel: Arc<AtomicBool>,
    pass: Arc<F>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<DaemonStats, DaemonError>
where
    F: Fn(Arc<AtomicBool>) -> Result<PassSummary, SyncError> + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = DaemonStats::default();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
                let started = Instant::now();
                let job = pass.clone();
                let flag = cancel.clone();
                let result = tokio::task::spawn_blocking(move || job(flag))
                    .await
                    .map_err(|err| DaemonError::Join {
                        task: "sync_pass",
                        message: err.to_string(),
                    })?;
                stats.record(result, started.elapsed());
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    Ok(stats)
}

/// Install the global subscriber: `RUST_LOG` or `info`, written to stderr so
/// machine-readable stdout stays clean.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn empty_summary() -> PassSummary {
        serde_json::from_value(serde_json::json!({
            "started_at": "2024-01-01T00:00:00Z",
            "finished_at": "2024-01-01T00:00:01Z",
            "dry_run": false,
            "considered": 1,
            "downloaded": 0,
            "generated": 0,
            "skipped": 0,
            "local_only": 0,
            "tombstoned": 0,
            "errored": 1,
            "warnings": [],
            "cancelled": false,
            "errors": [],
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn runs_a_pass_per_tick_until_shutdown() {
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let calls = Arc::new(AtomicUsize::new(0));

        let stats = {
            let calls = calls.clone();
            let shutdown = shutdown_tx.clone();
            run_with(Duration::from_secs(60), shutdown_tx, move |_cancel| {
                if calls.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    let _ = shutdown.send(());
                }
                Ok(empty_summary())
            })
            .await
            .unwrap()
        };

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.passes, 3);
        assert_eq!(stats.errored_records, 3);
        assert!(stats.last_summary.is_some());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn shutdown_mid_pass_raises_cancel_flag() {
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let observed = Arc::new(Mutex::new(Vec::new()));

        let stats = {
            let observed = observed.clone();
            let shutdown = shutdown_tx.clone();
            run_with(Duration::from_secs(1), shutdown_tx, move |cancel| {
                let _ = shutdown.send(());
                // Wait for the signal task to raise the flag, as a pass would
                // between records.
                for _ in 0..500 {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    std::thread::sleep(std::time::Duration::from_millis(2));
                }
                observed.lock().unwrap().push(cancel.load(Ordering::SeqCst));
                let mut summary = empty_summary();
                summary.cancelled = true;
                Ok(summary)
            })
            .await
            .unwrap()
        };

        assert_eq!(*observed.lock().unwrap(), vec![true]);
        assert_eq!(stats.passes, 1);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn aborted_passes_do_not_stop_the_daemon() {
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let calls = Arc::new(AtomicUsize::new(0));

        let stats = {
            let calls = calls.clone();
            let shutdown = shutdown_tx.clone();
            run_with(Duration::from_secs(5), shutdown_tx, move |_cancel| {
                if calls.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                    let _ = shutdown.send(());
                }
                Err(SyncError::Io {
                    path: PathBuf::from("/nowhere"),
                    source: std::io::Error::other("gone"),
                })
            })
            .await
            .unwrap()
        };

        assert_eq!(stats.passes, 2);
        assert_eq!(stats.failed_passes, 2);
        assert!(stats.last_summary.is_none());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn panicking_pass_stops_the_daemon_with_join_error() {
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let result = tokio::time::timeout(
            Duration::from_secs(60),
            run_with(
                Duration::from_millis(10),
                shutdown_tx,
                |_: Arc<AtomicBool>| -> Result<PassSummary, SyncError> { panic!("pass exploded") },
            ),
        )
        .await
        .expect("daemon returned instead of hanging");

        assert!(matches!(
            result,
            Err(DaemonError::Join {
                task: "sync_pass",
                ..
            })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let err = tokio_test::block_on(run_with(Duration::ZERO, shutdown_tx, |_| {
            Ok(empty_summary())
        }))
        .unwrap_err();
        assert!(matches!(err, DaemonError::ZeroInterval));
    }
}
