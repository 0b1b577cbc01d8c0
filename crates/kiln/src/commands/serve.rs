//! Preview server command.

use anyhow::Result;
use kiln_server::{DevServer, DevServerConfig, ReloadHub};

use crate::config::KilnConfig;

/// Run the serve command.
pub async fn run(config: &KilnConfig, port: Option<u16>) -> Result<()> {
    let dir = &config.paths.dist;
    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'kiln build' first.",
            dir.display()
        );
    }

    let server_config = DevServerConfig {
        root: dir.clone(),
        port: port.unwrap_or(config.server.port),
        open: config.server.open,
        ..Default::default()
    };

    DevServer::new(server_config, ReloadHub::new())
        .run(super::shutdown_signal())
        .await?;

    Ok(())
}
