//! Stable downloads.
//!
//! ## Attempt state machine
//!
//! ```text
//! Streaming ──ok──▶ Stabilizing ──two equal non-zero polls──▶ Validating ──parses──▶ Done
//!     │                  │                                        │
//!     └─err─▶ TransientFailure ◀─poll error / never stable─┘      └─parse error─▶ Corrupt
//! ```
//!
//! `Corrupt` and `TransientFailure` both restart the whole attempt (a fresh
//! stream, no resume) after `attempt × base_delay`, up to
//! `max_attempts`. Time and file-size observation are injected through
//! [`Clock`] and [`SizeProbe`] so each transition can be driven in tests.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::IgnoredAny;

use reportsync_core::config::DownloadConfig;
use reportsync_core::{ObjectId, RemoteStore};

use crate::error::DownloadError;

// ---------------------------------------------------------------------------
// Injected effects
// ---------------------------------------------------------------------------

/// Source of real-time delays.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Observes the on-disk size of the destination file.
pub trait SizeProbe: Send + Sync {
    fn size(&self, path: &Path) -> io::Result<u64>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsSizeProbe;

impl SizeProbe for FsSizeProbe {
    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}

// ---------------------------------------------------------------------------
// Policy & states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        DownloadPolicy::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for DownloadPolicy {
    fn from(config: &DownloadConfig) -> Self {
        DownloadPolicy {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls.max(2),
        }
    }
}

/// Why an attempt did not reach `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Content arrived but does not parse.
    Corrupt(String),
    /// Stream, disk or stabilization failure.
    Transient(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Corrupt(reason) => write!(f, "corrupt content: {reason}"),
            AttemptFailure::Transient(reason) => write!(f, "transient failure: {reason}"),
        }
    }
}

/// States of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Streaming,
    Stabilizing,
    Validating { size: u64 },
    Done { size: u64 },
    Corrupt(String),
    TransientFailure(String),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Done { .. } | AttemptState::Corrupt(_) | AttemptState::TransientFailure(_)
        )
    }
}

/// Successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    /// 1-based number of the attempt that succeeded.
    pub attempts: u32,
    pub bytes: u64,
}

// ---------------------------------------------------------------------------
// StableDownloader
// ---------------------------------------------------------------------------

/// Downloads a remote object to a local path and guarantees the result is
/// complete and parseable, or reports why not.
pub struct StableDownloader {
    policy: DownloadPolicy,
    clock: Box<dyn Clock>,
    probe: Box<dyn SizeProbe>,
}

impl StableDownloader {
    pub fn new(policy: DownloadPolicy) -> Self {
        StableDownloader {
            policy,
            clock: Box::new(SystemClock),
            probe: Box::new(FsSizeProbe),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_probe(mut self, probe: impl SizeProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn policy(&self) -> &DownloadPolicy {
        &self.policy
    }

    /// Fetch `id` into `dest`, retrying whole attempts on failure.
    ///
    /// On error the contents of `dest` are undefined.
    pub fn download(
        &self,
        store: &dyn RemoteStore,
        id: &ObjectId,
        dest: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        let mut attempt = 1;
        loop {
            match self.run_attempt(store, id, dest) {
                Ok(bytes) => {
                    tracing::debug!(id = %id, path = %dest.display(), attempt, bytes, "download complete");
                    return Ok(DownloadOutcome {
                        path: dest.to_path_buf(),
                        attempts: attempt,
                        bytes,
                    });
                }
                Err(failure) if attempt >= self.policy.max_attempts => {
                    tracing::error!(
                        id = %id,
                        path = %dest.display(),
                        attempts = attempt,
                        error = %failure,
                        "download failed"
                    );
                    return Err(DownloadError::Exhausted {
                        path: dest.to_path_buf(),
                        attempts: attempt,
                        last: failure,
                    });
                }
                Err(failure) => {
                    let delay = self.policy.base_delay * attempt;
                    tracing::warn!(
                        id = %id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "download attempt failed; retrying"
                    );
                    self.clock.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Drive one attempt from `Streaming` to a terminal state.
    fn run_attempt(
        &self,
        store: &dyn RemoteStore,
        id: &ObjectId,
        dest: &Path,
    ) -> Result<u64, AttemptFailure> {
        let mut state = AttemptState::Streaming;
        while !state.is_terminal() {
            tracing::trace!(id = %id, ?state, "download transition");
            state = self.step(state, store, id, dest);
        }
        match state {
            AttemptState::Done { size } => Ok(size),
            AttemptState::Corrupt(reason) => Err(AttemptFailure::Corrupt(reason)),
            AttemptState::TransientFailure(reason) => Err(AttemptFailure::Transient(reason)),
            other => Err(AttemptFailure::Transient(format!(
                "attempt stopped in non-terminal state {other:?}"
            ))),
        }
    }

    /// A single transition. Terminal states map to themselves.
    pub fn step(
        &self,
        state: AttemptState,
        store: &dyn RemoteStore,
        id: &ObjectId,
        dest: &Path,
    ) -> AttemptState {
        match state {
            AttemptState::Streaming => match stream_to(store, id, dest) {
                Ok(()) => AttemptState::Stabilizing,
                Err(reason) => AttemptState::TransientFailure(reason),
            },
            AttemptState::Stabilizing => self.stabilize(dest),
            AttemptState::Validating { size } => validate(dest, size),
            terminal => terminal,
        }
    }

    /// Poll the destination size until two consecutive polls agree on a
    /// non-zero value.
    fn stabilize(&self, dest: &Path) -> AttemptState {
        let mut previous: Option<u64> = None;
        for poll in 0..self.policy.max_polls {
            if poll > 0 {
                self.clock.sleep(self.policy.poll_interval);
            }
            let size = match self.probe.size(dest) {
                Ok(size) => size,
                Err(err) => {
                    return AttemptState::TransientFailure(format!(
                        "cannot stat {}: {err}",
                        dest.display()
                    ))
                }
            };
            if size > 0 && previous == Some(size) {
                return AttemptState::Validating { size };
            }
            previous = Some(size);
        }
        AttemptState::TransientFailure(format!(
            "file never stabilized after {} polls",
            self.policy.max_polls
        ))
    }
}

fn stream_to(store: &dyn RemoteStore, id: &ObjectId, dest: &Path) -> Result<(), String> {
    let mut reader = store
        .download_stream(id)
        .map_err(|e| format!("cannot open stream: {e}"))?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
    }
    let mut file =
        File::create(dest).map_err(|e| format!("cannot create {}: {e}", dest.display()))?;
    io::copy(&mut reader, &mut file).map_err(|e| format!("stream interrupted: {e}"))?;
    file.sync_all()
        .map_err(|e| format!("cannot flush {}: {e}", dest.display()))?;
    Ok(())
}

fn validate(dest: &Path, size: u64) -> AttemptState {
    let mut bytes = Vec::with_capacity(size as usize);
    let read = File::open(dest).and_then(|mut f| f.read_to_end(&mut bytes));
    if let Err(err) = read {
        return AttemptState::TransientFailure(format!(
            "cannot read {}: {err}",
            dest.display()
        ));
    }
    match serde_json::from_slice::<IgnoredAny>(&bytes) {
        Ok(_) => AttemptState::Done {
            size: bytes.len() as u64,
        },
        Err(err) => AttemptState::Corrupt(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryRemoteStore, Payload};
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct FakeClock {
        sleeps: Arc<Mutex<Vec<Duration>>>,
    }

    impl FakeClock {
        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    impl Clock for FakeClock {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    /// Reports scripted sizes, then repeats the last one.
    #[derive(Clone)]
    struct ScriptedProbe {
        sizes: Arc<Mutex<VecDeque<u64>>>,
        polls: Arc<Mutex<u32>>,
    }

    impl ScriptedProbe {
        fn new(sizes: &[u64]) -> Self {
            ScriptedProbe {
                sizes: Arc::new(Mutex::new(sizes.iter().copied().collect())),
                polls: Arc::new(Mutex::new(0)),
            }
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    impl SizeProbe for ScriptedProbe {
        fn size(&self, _path: &Path) -> io::Result<u64> {
            *self.polls.lock().unwrap() += 1;
            let mut sizes = self.sizes.lock().unwrap();
            if sizes.len() > 1 {
                Ok(sizes.pop_front().unwrap())
            } else {
                Ok(*sizes.front().unwrap_or(&0))
            }
        }
    }

    fn policy() -> DownloadPolicy {
        DownloadPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            max_polls: 5,
        }
    }

    /// Valid JSON padded with whitespace to exactly `len` bytes.
    fn json_of_len(len: usize) -> Vec<u8> {
        let mut bytes = br#"{"patient":{"name":"Alice"}}"#.to_vec();
        bytes.resize(len, b' ');
        bytes
    }

    /// Same length as `json_of_len`, but truncated mid-object.
    fn corrupt_of_len(len: usize) -> Vec<u8> {
        let mut bytes = br#"{"patient":{"name":"Al"#.to_vec();
        bytes.resize(len, b' ');
        bytes
    }

    #[test]
    fn stable_download_completes_on_first_attempt() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let id = store.put(&store.root(), "a.json", &json_of_len(4096), Utc::now());
        let clock = FakeClock::default();
        let probe = ScriptedProbe::new(&[4096, 4096]);
        let downloader = StableDownloader::new(policy())
            .with_clock(clock.clone())
            .with_probe(probe.clone());

        let dest = tmp.path().join("a.json");
        let outcome = downloader.download(&store, &id, &dest).unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.bytes, 4096);
        assert_eq!(probe.polls(), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(10)]);
        assert_eq!(std::fs::read(&dest).unwrap(), json_of_len(4096));
    }

    #[test]
    fn corrupt_then_valid_succeeds_on_second_attempt() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let id = store.put(&store.root(), "a.json", &json_of_len(2048), Utc::now());
        store.script_downloads(
            &id,
            vec![
                Payload::Bytes(corrupt_of_len(2048)),
                Payload::Bytes(json_of_len(2048)),
            ],
        );
        let clock = FakeClock::default();
        let downloader = StableDownloader::new(policy()).with_clock(clock.clone());

        let outcome = downloader
            .download(&store, &id, &tmp.path().join("a.json"))
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.bytes, 2048);
        assert_eq!(store.download_count(&id), 2);
        // one poll interval per attempt, one retry delay of 1 × base
        assert!(clock.sleeps().contains(&Duration::from_millis(100)));
    }

    #[test]
    fn retry_delays_grow_linearly_and_exhaust() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let id = store.put(&store.root(), "a.json", b"{}", Utc::now());
        store.script_downloads(
            &id,
            vec![
                Payload::Fail("reset by peer".into()),
                Payload::Fail("reset by peer".into()),
                Payload::Fail("reset by peer".into()),
            ],
        );
        let clock = FakeClock::default();
        let downloader = StableDownloader::new(policy()).with_clock(clock.clone());
        let dest = tmp.path().join("a.json");

        let err = downloader.download(&store, &id, &dest).unwrap_err();

        match &err {
            DownloadError::Exhausted { path, attempts, last } => {
                assert_eq!(path, &dest);
                assert_eq!(*attempts, 3);
                assert!(matches!(last, AttemptFailure::Transient(_)));
            }
        }
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
        assert!(err.to_string().contains("3 attempt(s)"));
    }

    #[test]
    fn never_stabilizing_is_transient() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let id = store.put(&store.root(), "a.json", b"{}", Utc::now());
        let probe = ScriptedProbe::new(&[1, 2, 3, 4, 5, 6]);
        let downloader = StableDownloader::new(policy())
            .with_clock(FakeClock::default())
            .with_probe(probe);

        let next = downloader.step(
            AttemptState::Stabilizing,
            &store,
            &id,
            &tmp.path().join("a.json"),
        );
        match next {
            AttemptState::TransientFailure(reason) => {
                assert!(reason.contains("never stabilized"), "{reason}");
            }
            other => panic!("expected transient failure, got {other:?}"),
        }
    }

    #[test]
    fn zero_size_never_counts_as_stable() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let id = store.put(&store.root(), "a.json", b"", Utc::now());
        let downloader = StableDownloader::new(policy())
            .with_clock(FakeClock::default())
            .with_probe(ScriptedProbe::new(&[0]));

        let next = downloader.step(AttemptState::Stabilizing, &store, &id, tmp.path());
        assert!(matches!(next, AttemptState::TransientFailure(_)));
    }

    #[test]
    fn growing_file_waits_for_two_equal_polls() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let id = store.put(&store.root(), "a.json", b"{}", Utc::now());
        let probe = ScriptedProbe::new(&[10, 20, 20]);
        let downloader = StableDownloader::new(policy())
            .with_clock(FakeClock::default())
            .with_probe(probe.clone());

        let next = downloader.step(AttemptState::Stabilizing, &store, &id, tmp.path());
        assert_eq!(next, AttemptState::Validating { size: 20 });
        assert_eq!(probe.polls(), 3);
    }

    #[test]
    fn validating_unparseable_content_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("bad.json");
        std::fs::write(&dest, b"{\"a\":").unwrap();
        let store = MemoryRemoteStore::new();
        let downloader = StableDownloader::new(policy());

        let next = downloader.step(
            AttemptState::Validating { size: 5 },
            &store,
            &ObjectId::from("unused"),
            &dest,
        );
        assert!(matches!(next, AttemptState::Corrupt(_)));
    }

    #[test]
    fn stream_error_is_transient() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let downloader = StableDownloader::new(policy());

        let next = downloader.step(
            AttemptState::Streaming,
            &store,
            &ObjectId::from("missing"),
            &tmp.path().join("x.json"),
        );
        assert!(matches!(next, AttemptState::TransientFailure(_)));
    }

    #[test]
    fn terminal_states_are_fixed_points() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryRemoteStore::new();
        let downloader = StableDownloader::new(policy());
        let done = AttemptState::Done { size: 1 };
        assert_eq!(
            downloader.step(done.clone(), &store, &ObjectId::from("x"), tmp.path()),
            done
        );
    }
}
