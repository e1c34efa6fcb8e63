//! Batch audit engine.
//!
//! Files are checked concurrently: each one runs through the [`Checker`] on
//! tokio's blocking pool, with a semaphore bounding how many run at once.
//! A file that cannot be checked at all (deleted mid-run, unreadable, a
//! panicking stage) becomes an [`FileOutcome::Error`] verdict instead of
//! aborting the batch.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::checker::Checker;
use crate::error::{Result, causes};
use crate::file_discovery::FileDiscovery;
use crate::logger::FailureRecord;
use crate::passing::Passing;
use crate::result::ValidationResult;

/// Audit engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    /// Number of files checked at the same time
    pub max_concurrent_validations: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: num_cpus::get(),
        }
    }
}

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The pipeline ran; `severity` is `PASSING` when nothing failed
    Checked {
        severity: Passing,
        error: Option<String>,
        causes: Vec<String>,
    },
    /// The pipeline could not run
    Error { message: String },
}

impl FileOutcome {
    pub fn from_result(result: &ValidationResult) -> Self {
        let (error, causes) = match result.error() {
            Some(error) => {
                let mut chain = causes(error);
                let top = chain.remove(0);
                (Some(top), chain)
            }
            None => (None, Vec::new()),
        };
        FileOutcome::Checked {
            severity: result.severity(),
            error,
            causes,
        }
    }

    pub fn severity(&self) -> Option<Passing> {
        match self {
            FileOutcome::Checked { severity, .. } => Some(*severity),
            FileOutcome::Error { .. } => None,
        }
    }

    pub fn is_passing(&self) -> bool {
        self.severity() == Some(Passing::Passing)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FileOutcome::Error { .. })
    }
}

/// Verdict for one file
#[derive(Debug, Clone, Serialize)]
pub struct FileVerdict {
    pub path: PathBuf,
    pub outcome: FileOutcome,
    pub duration: Duration,
}

impl FileVerdict {
    /// A log record, for checked files that did not pass.
    pub fn failure_record(&self) -> Option<FailureRecord> {
        match &self.outcome {
            FileOutcome::Checked {
                severity,
                error: Some(error),
                causes,
            } => {
                let mut message = error.clone();
                for cause in causes {
                    message.push_str(": ");
                    message.push_str(cause);
                }
                Some(FailureRecord {
                    filename: self.path.clone(),
                    severity: *severity,
                    message,
                })
            }
            _ => None,
        }
    }
}

/// Aggregated verdicts of a batch
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub total_files: usize,
    pub passing_files: usize,
    pub failed_files: usize,
    pub errored_files: usize,
    /// Checked files per severity, `PASSING` included
    pub by_severity: BTreeMap<Passing, usize>,
    pub total_duration: Duration,
    pub files: Vec<FileVerdict>,
}

impl AuditReport {
    pub fn aggregate(files: Vec<FileVerdict>, total_duration: Duration) -> Self {
        let mut by_severity = BTreeMap::new();
        let mut errored_files = 0;

        for verdict in &files {
            match verdict.outcome.severity() {
                Some(severity) => *by_severity.entry(severity).or_insert(0) += 1,
                None => errored_files += 1,
            }
        }

        let passing_files = by_severity.get(&Passing::Passing).copied().unwrap_or(0);
        let total_files = files.len();

        Self {
            total_files,
            passing_files,
            failed_files: total_files - passing_files - errored_files,
            errored_files,
            by_severity,
            total_duration,
            files,
        }
    }

    pub fn count(&self, severity: Passing) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// True when every file passed; an empty batch counts as passing.
    pub fn all_passing(&self) -> bool {
        self.passing_files == self.total_files
    }

    pub fn failure_records(&self) -> Vec<FailureRecord> {
        self.files
            .iter()
            .filter_map(FileVerdict::failure_record)
            .collect()
    }
}

/// Runs a [`Checker`] over many files at once
#[derive(Debug, Clone)]
pub struct AuditEngine {
    checker: Arc<Checker>,
    config: AuditConfig,
}

impl AuditEngine {
    pub fn new(checker: Checker, config: AuditConfig) -> Self {
        Self {
            checker: Arc::new(checker),
            config,
        }
    }

    /// Discovers files under `roots` and audits them.
    pub async fn audit_paths(
        &self,
        roots: &[PathBuf],
        discovery: &FileDiscovery,
    ) -> Result<AuditReport> {
        let files = discovery.discover_all(roots).await?;
        info!(files = files.len(), "files discovered");
        Ok(self.audit_files(files).await)
    }

    /// Audits `files`; verdicts keep the input order.
    pub async fn audit_files(&self, files: Vec<PathBuf>) -> AuditReport {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_validations.max(1)));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|path| {
                let checker = Arc::clone(&self.checker);
                let semaphore = Arc::clone(&semaphore);
                async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    Self::audit_one(checker, path).await
                }
            })
            .collect();

        let verdicts = join_all(tasks).await;
        let report = AuditReport::aggregate(verdicts, start.elapsed());
        info!(
            total = report.total_files,
            passing = report.passing_files,
            failed = report.failed_files,
            errored = report.errored_files,
            "audit finished"
        );
        report
    }

    async fn audit_one(checker: Arc<Checker>, path: PathBuf) -> FileVerdict {
        let start = Instant::now();
        let task_path = path.clone();
        let joined = tokio::task::spawn_blocking(move || checker.feed_in(&task_path)).await;

        let outcome = match joined {
            Ok(Ok(result)) => {
                debug!(path = %path.display(), severity = %result.severity(), "file checked");
                FileOutcome::from_result(&result)
            }
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "file could not be checked");
                FileOutcome::Error {
                    message: e.to_string(),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "validation task failed");
                FileOutcome::Error {
                    message: format!("Task join error: {}", e),
                }
            }
        };

        FileVerdict {
            path,
            outcome,
            duration: start.elapsed(),
        }
    }
}
