//! Pass accounting.
//!
//! A [`PassSummary`] is threaded through one pass and returned by value, so
//! concurrent passes (tests, daemon ticks) never share counters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reportsync_core::RecordName;

/// Where in the pipeline a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Download retries exhausted on stream, disk or stabilization errors.
    Transient,
    /// Download retries exhausted on unparseable content.
    Corrupt,
    /// Required or Structural findings.
    Validation,
    Generation,
    Upload,
    /// The local file or remote name could not be used at all.
    Local,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Transient => "transient",
            FailureKind::Corrupt => "corrupt",
            FailureKind::Validation => "validation",
            FailureKind::Generation => "generation",
            FailureKind::Upload => "upload",
            FailureKind::Local => "local",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFailure {
    pub name: RecordName,
    pub kind: FailureKind,
    pub message: String,
}

/// Aggregate outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Set when decisions were computed but nothing was executed; the
    /// counters then describe what a real pass would do.
    pub dry_run: bool,
    pub considered: usize,
    pub downloaded: usize,
    pub generated: usize,
    pub skipped: usize,
    pub local_only: usize,
    pub tombstoned: usize,
    pub errored: usize,
    pub warnings: Vec<String>,
    pub cancelled: bool,
    pub errors: Vec<ObjectFailure>,
}

impl PassSummary {
    pub fn start(dry_run: bool) -> Self {
        let now = Utc::now();
        PassSummary {
            started_at: now,
            finished_at: now,
            dry_run,
            considered: 0,
            downloaded: 0,
            generated: 0,
            skipped: 0,
            local_only: 0,
            tombstoned: 0,
            errored: 0,
            warnings: Vec::new(),
            cancelled: false,
            errors: Vec::new(),
        }
    }

    pub fn fail(&mut self, name: &RecordName, kind: FailureKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(name = %name, kind = %kind, error = %message, "record failed");
        self.errored += 1;
        self.errors.push(ObjectFailure {
            name: name.clone(),
            kind,
            message,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// No record failed.
    pub fn is_clean(&self) -> bool {
        self.errored == 0
    }

    /// Nothing was found locally or remotely.
    pub fn is_empty(&self) -> bool {
        self.considered == 0 && self.tombstoned == 0 && !self.cancelled
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} considered, {} downloaded, {} generated, {} skipped, {} local-only, {} tombstoned, {} errored",
            self.considered,
            self.downloaded,
            self.generated,
            self.skipped,
            self.local_only,
            self.tombstoned,
            self.errored
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_counts_and_records() {
        let mut summary = PassSummary::start(false);
        summary.fail(&RecordName::from("a.json"), FailureKind::Upload, "503");
        assert_eq!(summary.errored, 1);
        assert!(!summary.is_clean());
        assert_eq!(summary.errors[0].kind, FailureKind::Upload);
    }

    #[test]
    fn serializes_kinds_lowercase() {
        let mut summary = PassSummary::start(false);
        summary.fail(&RecordName::from("a.json"), FailureKind::Validation, "x");
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["errors"][0]["kind"], "validation");
        assert_eq!(json["errors"][0]["name"], "a.json");
    }

    #[test]
    fn fresh_summary_is_empty_and_clean() {
        let summary = PassSummary::start(true).finish();
        assert!(summary.is_empty());
        assert!(summary.is_clean());
        assert!(summary.finished_at >= summary.started_at);
    }
}
