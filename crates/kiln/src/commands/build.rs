//! One-shot build command.

use anyhow::{bail, Result};

use crate::config::KilnConfig;

/// Run the build command.
pub async fn run(config: &KilnConfig, strict: bool) -> Result<()> {
    let summary = config.orchestrator().build().await?;

    let warnings: usize = summary.reports.iter().map(|r| r.warnings().count()).sum();

    tracing::info!(
        "Built {} files in {}ms",
        summary.files_written(),
        summary.duration_ms
    );
    tracing::info!("Output: {}", config.paths.dist.display());

    if warnings > 0 {
        if strict {
            bail!("Build finished with {} warning(s)", warnings);
        }
        tracing::warn!("Build finished with {} warning(s)", warnings);
    }

    Ok(())
}
