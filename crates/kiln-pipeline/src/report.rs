//! Per-file results, run summaries and the notification channel.

use std::path::PathBuf;
use std::sync::Mutex;

use kiln_include::IncludeError;
use kiln_transforms::{AssetClass, TransformError};

use crate::pipeline::PipelineError;

/// Why a single file was not written.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error(transparent)]
    Include(#[from] IncludeError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("{} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    /// Include failures break the page they belong to and fail the build;
    /// everything else is a warning.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FileError::Include(_))
    }
}

/// A file that could not be processed.
#[derive(Debug)]
pub struct FileFailure {
    pub class: AssetClass,
    pub path: PathBuf,
    pub error: FileError,
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub class: AssetClass,

    /// Output files written
    pub written: Vec<PathBuf>,

    /// Sources skipped because their output was up to date
    pub skipped: Vec<PathBuf>,

    /// Sources that failed
    pub failures: Vec<FileFailure>,

    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn new(class: AssetClass) -> Self {
        Self {
            class,
            written: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn fatal_failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.failures.iter().filter(|f| f.error.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &FileFailure> {
        self.failures.iter().filter(|f| !f.error.is_fatal())
    }
}

/// Aggregated result of a build.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub reports: Vec<PipelineReport>,
    pub duration_ms: u64,
}

impl BuildSummary {
    /// The build completed, but some files failed with non-fatal errors.
    pub fn has_warnings(&self) -> bool {
        self.reports.iter().any(|r| r.warnings().next().is_some())
    }

    pub fn files_written(&self) -> usize {
        self.reports.iter().map(|r| r.written.len()).sum()
    }

    pub fn report(&self, class: AssetClass) -> Option<&PipelineReport> {
        self.reports.iter().find(|r| r.class == class)
    }
}

/// Something a user should hear about.
#[derive(Debug)]
pub enum Notice<'a> {
    FileFailed(&'a FileFailure),
    PipelineFinished(&'a PipelineReport),
    PipelineFailed {
        class: AssetClass,
        error: &'a PipelineError,
    },
}

/// The single channel every failure and completion is reported through.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice<'_>);
}

/// Reports notices as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice<'_>) {
        match notice {
            Notice::FileFailed(failure) if failure.error.is_fatal() => {
                tracing::error!("[{}] {}", failure.class, failure.error);
            }
            Notice::FileFailed(failure) => {
                tracing::warn!("[{}] {}", failure.class, failure.error);
            }
            Notice::PipelineFinished(report) => {
                tracing::info!(
                    "[{}] {} written, {} up to date, {} failed in {}ms",
                    report.class,
                    report.written.len(),
                    report.skipped.len(),
                    report.failures.len(),
                    report.duration_ms
                );
            }
            Notice::PipelineFailed { class, error } => {
                tracing::error!("[{}] pipeline failed: {}", class, error);
            }
        }
    }
}

/// Records notices as strings; useful in tests and for summaries.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice<'_>) {
        let line = match notice {
            Notice::FileFailed(f) => format!("failed {}: {}", f.class, f.error),
            Notice::PipelineFinished(r) => format!("finished {}", r.class),
            Notice::PipelineFailed { class, error } => format!("aborted {}: {}", class, error),
        };
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(line);
        }
    }
}
