//! Asset pipelines for kiln.
//!
//! Each asset class runs `Discover → Include → Transform → Rename → Write`.
//! The [`Orchestrator`] cleans the output tree and runs every class
//! concurrently through a small [`TaskGraph`].

pub mod clean;
pub mod freshness;
pub mod graph;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;
pub mod report;

pub use clean::{clean, CleanError};
pub use graph::{GraphError, GraphRun, StepOutcome, TaskGraph};
pub use orchestrator::{BuildError, Orchestrator, StepError, StepOutput};
pub use paths::{output_file_name, ClassPaths, PathConfig, PathError, SourceFile};
pub use pipeline::{AssetPipeline, PipelineError};
pub use report::{
    BuildSummary, CollectingNotifier, FileError, FileFailure, Notice, Notifier, PipelineReport,
    TracingNotifier,
};
