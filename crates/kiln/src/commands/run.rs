//! Single asset class command.

use anyhow::{bail, Result};
use kiln_transforms::AssetClass;

use crate::config::KilnConfig;

/// Run one class pipeline without cleaning first.
pub async fn run(config: &KilnConfig, class: AssetClass) -> Result<()> {
    let report = config.orchestrator().run_class(class).await?;

    tracing::info!(
        "Built {}: {} written, {} skipped in {}ms",
        class,
        report.written.len(),
        report.skipped.len(),
        report.duration_ms
    );

    let fatal = report.fatal_failures().count();
    if fatal > 0 {
        bail!("{} {} file(s) failed", fatal, class);
    }

    Ok(())
}
