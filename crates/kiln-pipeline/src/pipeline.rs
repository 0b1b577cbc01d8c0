//! One asset class, end to end.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use kiln_include::Includer;
use kiln_transforms::{AssetClass, Transform, TransformSet};

use crate::freshness::is_up_to_date;
use crate::paths::{PathConfig, PathError, SourceFile};
use crate::report::{FileError, FileFailure, Notice, Notifier, PipelineReport};

/// Errors that abort a whole pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Discover(#[from] PathError),

    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write bundle {}: {source}", .path.display())]
    Bundle {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline task did not complete: {0}")]
    Aborted(String),
}

/// `Discover → Include → Transform → Rename → Write` for one asset class.
#[derive(Clone)]
pub struct AssetPipeline {
    class: AssetClass,
    paths: Arc<PathConfig>,
    transform: Arc<dyn Transform>,
    includer: Includer,
}

impl AssetPipeline {
    /// Create the pipeline for `class` using its transform from `transforms`.
    pub fn new(class: AssetClass, paths: Arc<PathConfig>, transforms: &TransformSet) -> Self {
        Self {
            class,
            paths,
            transform: transforms.get(class),
            includer: Includer::new(),
        }
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    /// Run the pipeline once.
    ///
    /// Per-file failures are sent to `notifier` and recorded in the report;
    /// only setup failures (unreadable source tree, unwritable output
    /// directory) return an error.
    pub fn run(&self, notifier: &dyn Notifier) -> Result<PipelineReport, PipelineError> {
        let start = Instant::now();
        let mut report = PipelineReport::new(self.class);

        let files = self.paths.discover(self.class)?;

        let output_dir = self.paths.output_dir(self.class);
        fs::create_dir_all(&output_dir).map_err(|source| PipelineError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let (pending, fresh): (Vec<SourceFile>, Vec<SourceFile>) = if self.class.is_incremental() {
            files.into_iter().partition(|file| {
                !is_up_to_date(&file.path, &self.paths.output_path(self.class, file))
            })
        } else {
            (files, Vec::new())
        };
        report.skipped = fresh.into_iter().map(|f| f.path).collect();

        tracing::debug!(
            "[{}] {} to process, {} up to date",
            self.class,
            pending.len(),
            report.skipped.len()
        );

        match self.bundle_path() {
            Some(bundle) => self.run_bundled(&pending, &bundle, &mut report)?,
            None => self.run_each(&pending, &mut report),
        }

        for failure in &report.failures {
            notifier.notify(Notice::FileFailed(failure));
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        notifier.notify(Notice::PipelineFinished(&report));

        Ok(report)
    }

    fn bundle_path(&self) -> Option<PathBuf> {
        if self.class == AssetClass::Stylesheet {
            self.paths.bundle_path()
        } else {
            None
        }
    }

    /// Transform and write every file independently.
    fn run_each(&self, files: &[SourceFile], report: &mut PipelineReport) {
        let results: Vec<(&SourceFile, Result<PathBuf, FileError>)> = files
            .par_iter()
            .map(|file| {
                let result = self.process(file).and_then(|bytes| {
                    let output = self.paths.output_path(self.class, file);
                    write_output(&output, &bytes).map(|_| output)
                });
                (file, result)
            })
            .collect();

        for (file, result) in results {
            match result {
                Ok(output) => report.written.push(output),
                Err(error) => report.failures.push(self.failure(file, error)),
            }
        }
    }

    /// Transform every file, then concatenate the successes in source order.
    fn run_bundled(
        &self,
        files: &[SourceFile],
        bundle: &Path,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let results: Vec<(&SourceFile, Result<Vec<u8>, FileError>)> = files
            .par_iter()
            .map(|file| (file, self.process(file)))
            .collect();

        let mut parts = Vec::new();
        for (file, result) in results {
            match result {
                Ok(bytes) => parts.push(bytes),
                Err(error) => report.failures.push(self.failure(file, error)),
            }
        }

        if parts.is_empty() {
            return Ok(());
        }

        let joined = parts.join(&b'\n');
        write_output(bundle, &joined).map_err(|e| match e {
            FileError::Write { path, source } => PipelineError::Bundle { path, source },
            other => PipelineError::Aborted(other.to_string()),
        })?;
        report.written.push(bundle.to_path_buf());

        Ok(())
    }

    /// Read, expand includes, transform.
    fn process(&self, file: &SourceFile) -> Result<Vec<u8>, FileError> {
        let content = fs::read(&file.path).map_err(|source| FileError::Read {
            path: file.path.clone(),
            source,
        })?;

        let content = if self.class.expands_includes() {
            let text = String::from_utf8(content)
                .map_err(|_| FileError::Encoding(file.path.clone()))?;
            self.includer
                .include_from(&text, &file.path)?
                .into_bytes()
        } else {
            content
        };

        Ok(self.transform.transform(&content, &file.path)?)
    }

    fn failure(&self, file: &SourceFile, error: FileError) -> FileFailure {
        FileFailure {
            class: self.class,
            path: file.path.clone(),
            error,
        }
    }
}

impl std::fmt::Debug for AssetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPipeline")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    let write_err = |source| FileError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, bytes).map_err(write_err)
}
