//! Watch command: build, then rebuild on change and serve with live reload.

use anyhow::Result;
use kiln_pipeline::Orchestrator;
use kiln_server::{DevServer, DevServerConfig, ReloadHub, ReloadMessage, WatchSession};

use crate::config::KilnConfig;

/// Run the watch command.
pub async fn run(config: &KilnConfig, port: Option<u16>, open: bool) -> Result<()> {
    let orchestrator = config.orchestrator();
    let hub = ReloadHub::new();

    initial_build(&orchestrator, &hub).await;

    let session = WatchSession::start(orchestrator, hub.clone())?;

    let server_config = DevServerConfig {
        root: config.paths.dist.clone(),
        port: port.unwrap_or(config.server.port),
        open: open || config.server.open,
        ..Default::default()
    };

    let served = DevServer::new(server_config, hub)
        .run(super::shutdown_signal())
        .await;

    session.stop();
    served?;

    Ok(())
}

/// Build everything once and tell connected browsers to reload.
///
/// A failed build is logged, not returned, so the error can be fixed while
/// watching.
async fn initial_build(orchestrator: &Orchestrator, hub: &ReloadHub) {
    match orchestrator.build().await {
        Ok(summary) => {
            tracing::info!(
                "Built {} files in {}ms",
                summary.files_written(),
                summary.duration_ms
            );
            hub.send(ReloadMessage::Reload);
        }
        Err(e) => tracing::error!("Initial build failed: {}", e),
    }
}
