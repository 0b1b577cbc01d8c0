//! Clean command.

use anyhow::{Context, Result};

use crate::config::KilnConfig;

/// Run the clean command.
pub async fn run(config: &KilnConfig) -> Result<()> {
    config
        .orchestrator()
        .clean()
        .await
        .with_context(|| format!("Failed to clean {}", config.paths.dist.display()))
}
