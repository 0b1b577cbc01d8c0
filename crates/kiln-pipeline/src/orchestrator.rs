//! Build orchestration: clean, then every asset class concurrently.

use std::sync::Arc;
use std::time::Instant;

use kiln_transforms::{AssetClass, TransformSet};

use crate::clean::{clean, CleanError};
use crate::graph::{GraphError, StepOutcome, TaskGraph};
use crate::paths::PathConfig;
use crate::pipeline::{AssetPipeline, PipelineError};
use crate::report::{BuildSummary, Notice, Notifier, PipelineReport};

const CLEAN_STEP: &str = "clean";

/// Result of a single build step.
#[derive(Debug)]
pub enum StepOutput {
    Cleaned,
    Ran(PipelineReport),
}

/// Error of a single build step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error("{class} pipeline failed: {source}")]
    Pipeline {
        class: AssetClass,
        #[source]
        source: PipelineError,
    },
}

/// Errors that fail a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Build step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Build step '{step}' panicked: {message}")]
    Panicked { step: String, message: String },

    #[error("{} file(s) failed with unrecoverable errors: {}", .0.len(), .0.join("; "))]
    FatalFiles(Vec<String>),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Runs pipelines against one immutable [`PathConfig`].
#[derive(Clone)]
pub struct Orchestrator {
    paths: Arc<PathConfig>,
    transforms: TransformSet,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(
        paths: Arc<PathConfig>,
        transforms: TransformSet,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            paths,
            transforms,
            notifier,
        }
    }

    pub fn paths(&self) -> &Arc<PathConfig> {
        &self.paths
    }

    /// The pipeline for `class`.
    pub fn pipeline(&self, class: AssetClass) -> AssetPipeline {
        AssetPipeline::new(class, Arc::clone(&self.paths), &self.transforms)
    }

    /// Delete the output tree.
    pub async fn clean(&self) -> Result<(), CleanError> {
        let output = self.paths.output_root.clone();
        tokio::task::spawn_blocking(move || clean(&output))
            .await
            .unwrap_or_else(|e| {
                Err(CleanError::Io {
                    path: self.paths.output_root.clone(),
                    source: std::io::Error::other(e),
                })
            })
    }

    /// Run a single class pipeline on the blocking pool.
    pub async fn run_class(&self, class: AssetClass) -> Result<PipelineReport, PipelineError> {
        let pipeline = self.pipeline(class);
        let notifier = Arc::clone(&self.notifier);

        let result = tokio::task::spawn_blocking(move || pipeline.run(notifier.as_ref()))
            .await
            .unwrap_or_else(|e| Err(PipelineError::Aborted(e.to_string())));

        if let Err(error) = &result {
            self.notifier.notify(Notice::PipelineFailed { class, error });
        }
        result
    }

    /// The build graph: `clean → {html, images, css, js, fonts}`.
    pub fn build_graph(&self) -> Result<TaskGraph<StepOutput, StepError>, GraphError> {
        let mut graph = TaskGraph::new();

        let output = self.paths.output_root.clone();
        graph.add_step(CLEAN_STEP, &[], move || {
            clean(&output)?;
            Ok(StepOutput::Cleaned)
        })?;

        for class in AssetClass::ALL {
            let pipeline = self.pipeline(class);
            let notifier = Arc::clone(&self.notifier);
            graph.add_step(class.name(), &[CLEAN_STEP], move || {
                match pipeline.run(notifier.as_ref()) {
                    Ok(report) => Ok(StepOutput::Ran(report)),
                    Err(source) => {
                        notifier.notify(Notice::PipelineFailed {
                            class,
                            error: &source,
                        });
                        Err(StepError::Pipeline { class, source })
                    }
                }
            })?;
        }

        Ok(graph)
    }

    /// Clean, then run every class concurrently.
    ///
    /// Per-file compile errors are warnings and leave the build successful
    /// (see [`BuildSummary::has_warnings`]); a failed step or a fatal file
    /// error fails it.
    pub async fn build(&self) -> Result<BuildSummary, BuildError> {
        let start = Instant::now();
        tracing::info!(
            "Building {} -> {}",
            self.paths.source_root.display(),
            self.paths.output_root.display()
        );

        let run = self.build_graph()?.run().await;

        let mut summary = BuildSummary::default();
        let mut first_error = None;

        for (step, outcome) in run.outcomes {
            match outcome {
                StepOutcome::Completed(StepOutput::Ran(report)) => summary.reports.push(report),
                StepOutcome::Completed(StepOutput::Cleaned) => {}
                StepOutcome::Failed(source) => {
                    first_error.get_or_insert(BuildError::Step { step, source });
                }
                StepOutcome::Panicked(message) => {
                    first_error.get_or_insert(BuildError::Panicked { step, message });
                }
                StepOutcome::Skipped { blocked_by } => {
                    tracing::warn!("Skipped '{}' because '{}' failed", step, blocked_by);
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        let fatal: Vec<String> = summary
            .reports
            .iter()
            .flat_map(|r| r.fatal_failures())
            .map(|f| f.error.to_string())
            .collect();
        if !fatal.is_empty() {
            return Err(BuildError::FatalFiles(fatal));
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingNotifier;
    use std::fs;
    use tempfile::tempdir;

    fn orchestrator(root: &std::path::Path) -> Orchestrator {
        Orchestrator::new(
            Arc::new(PathConfig::new(root.join("src"), root.join("dist"))),
            TransformSet::default(),
            Arc::new(CollectingNotifier::new()),
        )
    }

    #[test]
    fn build_graph_has_clean_plus_every_class() {
        let temp = tempdir().unwrap();
        let graph = orchestrator(temp.path()).build_graph().unwrap();
        assert_eq!(graph.len(), 1 + AssetClass::ALL.len());
    }

    #[tokio::test]
    async fn build_removes_stale_outputs() {
        let temp = tempdir().unwrap();
        let stale = temp.path().join("dist/old.html");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/index.html"), "<h1>new</h1>").unwrap();

        let summary = orchestrator(temp.path()).build().await.unwrap();

        assert!(!stale.exists());
        assert!(temp.path().join("dist/index.html").exists());
        assert_eq!(summary.reports.len(), AssetClass::ALL.len());
        assert!(!summary.has_warnings());
    }

    #[tokio::test]
    async fn run_class_touches_only_that_class() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/js")).unwrap();
        fs::write(temp.path().join("src/index.html"), "<p>").unwrap();
        fs::write(temp.path().join("src/js/app.js"), "var a = 1;").unwrap();

        let report = orchestrator(temp.path())
            .run_class(AssetClass::Script)
            .await
            .unwrap();

        assert_eq!(report.written.len(), 1);
        assert!(temp.path().join("dist/js/app.min.js").exists());
        assert!(!temp.path().join("dist/index.html").exists());
    }
}
